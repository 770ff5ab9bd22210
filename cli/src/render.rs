use std::fmt::Write as _;

use bep_engine::{BuildEventItem, BuildEventSession, ByteStreamResolver, TargetIcon};

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Expand every item that has children, not just those needing attention.
    pub expand_all: bool,
}

fn line(out: &mut String, depth: usize, item: &BuildEventItem) {
    let icon = match item.icon() {
        Some(TargetIcon::Stop) => " [failed]".to_string(),
        Some(TargetIcon::Rule(rule)) => format!(" [{rule}]"),
        Some(TargetIcon::Interface) | None => String::new(),
    };
    let _ = write!(out, "{}{}{icon}", INDENT.repeat(depth), item.label());
    if let Some(description) = item.description() {
        let _ = write!(out, " - {description}");
    }
    out.push('\n');
}

/// Render the session's items, expanding children lazily. A child set that
/// fails to resolve is reported inline and does not stop the rest.
pub async fn render<R: ByteStreamResolver>(
    session: &mut BuildEventSession<R>,
    options: RenderOptions,
) -> String {
    let mut out = String::new();
    let items: Vec<BuildEventItem> = session.items().to_vec();

    for item in &items {
        line(&mut out, 0, item);
        if !item.may_have_children() || !(options.expand_all || item.attention()) {
            continue;
        }
        let children = match session.children(item.id()).await {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!(item = %item.id(), "Failed to resolve children: {e}");
                let _ = writeln!(out, "{INDENT}! {e}");
                continue;
            }
        };
        for child in &children {
            line(&mut out, 1, child);
            if !child.may_have_children() {
                continue;
            }
            match session.children(child.id()).await {
                Ok(grandchildren) => {
                    for grandchild in &grandchildren {
                        line(&mut out, 2, grandchild);
                    }
                }
                Err(e) => {
                    let _ = writeln!(out, "{INDENT}{INDENT}! {e}");
                }
            }
        }
    }

    let status = session.markers().status_string();
    if !status.is_empty() {
        let _ = writeln!(out, "{status}");
    }
    out
}
