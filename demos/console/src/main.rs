use std::collections::HashMap;
use std::error::Error;

use murmur::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Log view
// ---------------------------------------------------------------------------

/// What the console remembers between notifications: enough to print
/// names and to tell "you" from everyone else.
#[derive(Default)]
struct LogView {
    names: HashMap<PlayerId, String>,
    local: Option<PlayerId>,
}

impl LogView {
    fn name(&self, id: PlayerId) -> String {
        self.names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn is_local(&self, id: PlayerId) -> bool {
        self.local == Some(id)
    }

    /// Updates the view and returns the line to print, if any.
    fn render(&mut self, n: &Notification) -> Option<String> {
        match n {
            Notification::PlayerJoined { id, name } => {
                self.names.insert(*id, name.clone());
                Some(format!("Joined now: {name}"))
            }
            Notification::PlayerLeft { id, name } => {
                self.names.remove(id);
                Some(format!("Left now: {name}"))
            }
            Notification::SelfStateChanged { id, .. } if self.is_local(*id) => None,
            Notification::SelfStateChanged {
                id,
                self_mute,
                self_deaf,
            } => {
                let who = self.name(*id);
                Some(match (*self_mute, *self_deaf) {
                    (_, true) => format!("{who} deafened themselves"),
                    (true, false) => format!("{who} muted themselves"),
                    (false, false) => format!("{who} is no longer muted"),
                })
            }
            Notification::MuteChanged {
                victim,
                actor,
                mute,
            } => {
                let admin = self.name(*actor);
                let verb = if *mute { "muted" } else { "unmuted" };
                Some(if self.is_local(*victim) {
                    format!("You were {verb} by {admin}")
                } else {
                    format!("{} {verb} by {admin}", self.name(*victim))
                })
            }
            Notification::DeafChanged {
                victim,
                actor,
                deaf,
            } => {
                let admin = self.name(*actor);
                let verb = if *deaf { "deafened" } else { "undeafened" };
                Some(if self.is_local(*victim) {
                    format!("You were {verb} by {admin}")
                } else {
                    format!("{} {verb} by {admin}", self.name(*victim))
                })
            }
            Notification::Kicked {
                victim,
                actor,
                reason,
            } => {
                let admin = self.name(*actor);
                Some(if self.is_local(*victim) {
                    format!("You were kicked from the server by {admin}: {reason}")
                } else {
                    format!(
                        "{} was kicked from the server by {admin}: {reason}",
                        self.name(*victim)
                    )
                })
            }
            Notification::ConnectionRejected { reason } => {
                Some(format!("Server connection rejected: {reason}"))
            }
            Notification::LocalIdentityEstablished { id } => {
                self.local = Some(*id);
                Some("Connected to server".to_string())
            }
            Notification::TalkingChanged { .. } => None,
            Notification::ProtocolViolation(e) => {
                Some(format!("Ignored server message: {e}"))
            }
            Notification::Disconnected { reason } => {
                self.local = None;
                self.names.clear();
                Some(match reason {
                    Some(reason) => format!("Server connection failed: {reason}"),
                    None => "Disconnected from server.".to_string(),
                })
            }
        }
    }
}

fn voice_line(change: VoiceStateChange) -> &'static str {
    match change {
        VoiceStateChange::Muted => "Muted",
        VoiceStateChange::Unmuted => "Unmuted",
        VoiceStateChange::UnmutedAndUndeafened => "Un-muted and undeafened",
        VoiceStateChange::Deafened => "Deafened",
        VoiceStateChange::MutedAndDeafened => "Muted and deafened",
        VoiceStateChange::Undeafened => "Undeafened",
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Input {
    Connect,
    Disconnect,
    Mute(PlayerId),
    Deaf(PlayerId),
    Kick(PlayerId, String),
    SelfMute,
    SelfDeaf,
    Who,
    Quit,
}

const HELP: &str = "commands: connect | disconnect | mute <id> | deaf <id> | \
                    kick <id> [reason] | selfmute | selfdeaf | who | quit";

fn parse_id(word: Option<&str>) -> Result<PlayerId, String> {
    let raw = word.ok_or_else(|| "missing player id".to_string())?;
    raw.parse::<u32>()
        .map(PlayerId)
        .map_err(|_| format!("not a player id: {raw}"))
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let command = words.next().ok_or_else(|| HELP.to_string())?;

    let input = match command {
        "connect" => Input::Connect,
        "disconnect" => Input::Disconnect,
        "mute" => Input::Mute(parse_id(words.next())?),
        "deaf" => Input::Deaf(parse_id(words.next())?),
        "kick" => {
            let victim = parse_id(words.next())?;
            let reason: Vec<&str> = words.collect();
            Input::Kick(victim, reason.join(" "))
        }
        "selfmute" => Input::SelfMute,
        "selfdeaf" => Input::SelfDeaf,
        "who" => Input::Who,
        "quit" | "exit" => Input::Quit,
        _ => return Err(HELP.to_string()),
    };
    Ok(input)
}

/// Runs one command. Returns `false` when the user asked to quit.
async fn run_command(client: &ClientHandle, input: Input) -> Result<bool, MurmurError> {
    match input {
        Input::Connect => client.connect().await?,
        Input::Disconnect => client.disconnect(None).await?,
        Input::Mute(victim) => client.toggle_mute(victim).await?,
        Input::Deaf(victim) => client.toggle_deaf(victim).await?,
        Input::Kick(victim, reason) => client.request_kick(victim, &reason).await?,
        Input::SelfMute => {
            let voice = client.status().await?.voice;
            let change = client.set_self_mute(!voice.mute()).await?;
            println!("{}", voice_line(change));
        }
        Input::SelfDeaf => {
            let voice = client.status().await?.voice;
            let change = client.set_self_deaf(!voice.deaf()).await?;
            println!("{}", voice_line(change));
        }
        Input::Who => {
            let status = client.status().await?;
            println!("{} ({} players)", status.phase, status.players.len());
            for player in &status.players {
                let marker = if status.is_local(player.id()) { "*" } else { " " };
                println!(
                    "{marker} {:>6} {:<20} {:?}",
                    player.id().to_string(),
                    player.name(),
                    player.flags().presence()
                );
            }
        }
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Reads the config file named by the first argument, or uses defaults.
fn load_config() -> Result<ClientConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(ClientConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!(
        server = %config.server_url,
        username = %config.username,
        "starting console client"
    );

    let (client, mut notifications) = ClientBuilder::new()
        .config(config)
        .spawn(WebSocketConnector, BinaryCodec);

    if let Err(e) = client.connect().await {
        tracing::error!(error = %e, "connect failed");
    }
    eprintln!("{HELP}");

    let mut view = LogView::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(n) = notifications.recv() => {
                if let Some(line) = view.render(&n) {
                    println!("{line}");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_input(&line) {
                    Ok(input) => match run_command(&client, input).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => eprintln!("error: {e}"),
                    },
                    Err(usage) => eprintln!("{usage}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect(None).await?;
    client.shutdown().await?;
    while let Some(n) = notifications.recv().await {
        if let Some(line) = view.render(&n) {
            println!("{line}");
        }
    }
    Ok(())
}
