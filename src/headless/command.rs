//! Line commands read from stdin in headless mode

/// One parsed stdin command
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Recognize an utterance as if it had been spoken
    Text(String),
    /// Push-to-talk start
    Wake,
    /// Push-to-talk end
    Silence,
    Mute,
    Unmute,
    /// User changed the device volume
    Volume(u8),
    UserInfo,
    /// Force reachability (`Some`) or go back to sampling (`None`)
    Network(Option<bool>),
    Stop,
    Start,
    Quit,
}

impl HostCommand {
    /// Parse one line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "text" | "say" => {
                if rest.is_empty() {
                    return Err("text requires an utterance".to_string());
                }
                Self::Text(rest.to_string())
            }
            "wake" => Self::Wake,
            "silence" => Self::Silence,
            "mute" => Self::Mute,
            "unmute" => Self::Unmute,
            "volume" | "vol" => {
                let percent = rest
                    .trim_end_matches('%')
                    .parse::<u8>()
                    .ok()
                    .filter(|p| *p <= 100)
                    .ok_or_else(|| format!("volume expects 0-100, got '{}'", rest))?;
                Self::Volume(percent)
            }
            "userinfo" => Self::UserInfo,
            "net" => match rest {
                "up" => Self::Network(Some(true)),
                "down" => Self::Network(Some(false)),
                "auto" => Self::Network(None),
                other => return Err(format!("net expects up, down or auto, got '{}'", other)),
            },
            "stop" => Self::Stop,
            "start" => Self::Start,
            "q" | "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{}'", other)),
        };

        Ok(Some(command))
    }
}
