use crate::collab::PlayerInfo;
use crate::ping::ServerStates;

/// What a template is evaluated against.
pub struct PlaceholderContext<'a> {
    pub viewer: &'a PlayerInfo,
    /// Player the row is about, if any.
    pub subject: Option<&'a PlayerInfo>,
    /// Players visible to the viewer.
    pub players: &'a [PlayerInfo],
    pub servers: &'a ServerStates,
}

impl PlaceholderContext<'_> {
    fn target(&self) -> &PlayerInfo {
        self.subject.unwrap_or(self.viewer)
    }
}

pub trait PlaceholderResolver: Send + Sync {
    fn resolve(&self, template: &str, ctx: &PlaceholderContext<'_>) -> String;
}

/// `{player}`, `{viewer}`, `{server}`, `{ping}`, `{online}`,
/// `{server_online}`, `{server_state}` and `&` color codes.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicPlaceholders;

impl BasicPlaceholders {
    fn value(&self, name: &str, ctx: &PlaceholderContext<'_>) -> Option<String> {
        let target = ctx.target();
        let server = target.server();
        let value = match name {
            "player" => target.name.clone(),
            "viewer" => ctx.viewer.name.clone(),
            "server" => server.unwrap_or_default().to_string(),
            "ping" => target.ping_millis.to_string(),
            "online" => ctx.players.len().to_string(),
            "server_online" => ctx
                .players
                .iter()
                .filter(|p| server.is_some() && p.server() == server)
                .count()
                .to_string(),
            "server_state" => match server.and_then(|s| ctx.servers.get(s)) {
                Some(state) if state.online => "online".to_string(),
                Some(_) => "offline".to_string(),
                None => "unknown".to_string(),
            },
            _ => return None,
        };
        Some(value)
    }
}

impl PlaceholderResolver for BasicPlaceholders {
    fn resolve(&self, template: &str, ctx: &PlaceholderContext<'_>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            match tail.find('}') {
                Some(close) => {
                    let name = &tail[1..close];
                    match self.value(name, ctx) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&tail[..=close]),
                    }
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        translate_color_codes(&out)
    }
}

/// Turns `&a` style codes into section-sign codes.
pub fn translate_color_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '&' {
            if let Some(&code) = chars.peek() {
                if is_format_code(code) {
                    out.push('§');
                    out.push(code.to_ascii_lowercase());
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

fn is_format_code(code: char) -> bool {
    matches!(code.to_ascii_lowercase(), '0'..='9' | 'a'..='f' | 'k'..='o' | 'r')
}
