use std::collections::VecDeque;

use swayipc_async::{Connection, Node};

/// Identity of the window a link was clicked in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceApp {
    Wayland(String),
    X11(String),
}

impl SourceApp {
    pub fn take_from_node(node: &Node) -> Option<Self> {
        if let Some(app_id) = &node.app_id {
            return Some(Self::Wayland(app_id.to_owned()));
        }
        let class = node.window_properties.as_ref()?.class.as_ref()?;
        Some(Self::X11(class.to_owned()))
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Wayland(app_id) => app_id,
            Self::X11(class) => class,
        }
    }

    pub fn into_id(self) -> String {
        match self {
            Self::Wayland(app_id) => app_id,
            Self::X11(class) => class,
        }
    }
}

fn focused(tree: Node) -> Option<Node> {
    let mut next = VecDeque::new();
    next.push_back(tree);
    while let Some(node) = next.pop_front() {
        if node.focused {
            return Some(node);
        }
        next.extend(node.nodes);
        next.extend(node.floating_nodes);
    }
    None
}

/// Asks sway which window holds focus. `None` when nothing with an app id is focused.
pub async fn focused_app() -> Result<Option<SourceApp>, swayipc_async::Error> {
    let mut conn = Connection::new().await?;
    let tree = conn.get_tree().await?;
    let app = focused(tree).as_ref().and_then(SourceApp::take_from_node);
    tracing::debug!(?app, "focused");
    Ok(app)
}

/// Like [`focused_app`] but failures only get logged.
pub async fn detect_source() -> Option<String> {
    match focused_app().await {
        Ok(app) => app.map(SourceApp::into_id),
        Err(e) => {
            tracing::warn!("cannot ask sway for the focused window: {}", e);
            None
        }
    }
}
