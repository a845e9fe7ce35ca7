//! The `attach` subcommand: an interactive scripted composer.
//!
//! Attaches to the coordinator as a real context: a [`Remapper`] over a
//! [`ScriptedPage`], a mutation pump, and live application of pushed
//! settings updates. Stdin drives the session; each line is literal text
//! typed into the focused editor, a key spec pressed through interception,
//! or a slash command. Synthetic dispatches loop back through interception
//! exactly as they would on a real surface, so the guard window and the
//! two-phase redispatch are observable from the terminal.

use std::{path::Path, sync::Arc};

use keychord::{Key, KeyEvent};
use sendkey_engine::{ControlSelector, EditorHost, EditorId, Outcome, Remapper, ScriptedPage};
use sendkey_protocol::{ActionSlot, Chord, MsgToContext, ipc::heartbeat};
use sendkey_server::Connection;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::{cli::AttachArgs, commands, error::Result, util};

/// Run the interactive driver until stdin closes or the coordinator goes
/// away.
pub async fn run(socket: &str, settings_path: Option<&Path>, args: &AttachArgs) -> Result<()> {
    let mut client = commands::connect(socket, settings_path).await?;
    let conn = client.connection()?;
    let initial = conn.get_settings().await?;

    let page = Arc::new(ScriptedPage::new());
    // Subscribe before anything can dispatch.
    let mut synthetic = page.events();
    for _ in 0..args.editors {
        if args.send_control {
            page.add_editor_with_control(ControlSelector::TestId, true);
        } else {
            page.add_editor();
        }
    }

    let remapper = Remapper::new(page.clone(), initial);
    remapper.install().await;
    let cancel = CancellationToken::new();
    let pump = remapper.spawn_mutation_pump(cancel.clone());

    let mut driver = Driver {
        focus: page.editors().await.first().copied(),
        page,
        remapper,
    };
    let mut lines = util::stdin_lines();

    println!("attached to {}", socket);
    commands::print_pair(&initial);
    println!("type text to compose, a chord like shift+enter to press it, /help for commands");

    // Heartbeats arrive once a second; silence past the timeout means the
    // coordinator hung without closing the socket.
    let hb_timer = sleep(heartbeat::timeout());
    tokio::pin!(hb_timer);

    loop {
        tokio::select! {
            biased;
            _ = &mut hb_timer => {
                println!("coordinator silent for {:?}; detaching", heartbeat::timeout());
                break;
            }
            maybe_line = lines.recv() => {
                let Some(line) = maybe_line else {
                    break;
                };
                match driver.handle_line(conn, &line).await {
                    Flow::Quit => break,
                    Flow::Continue => {}
                }
            }
            maybe_synth = synthetic.recv() => {
                if let Some((editor, event)) = maybe_synth {
                    let outcome = driver.press(editor, &event).await;
                    println!("  synthetic {} -> {}", event, outcome);
                    driver.show_editor(editor);
                }
            }
            event = conn.recv_event() => {
                hb_timer.as_mut().reset(Instant::now() + heartbeat::timeout());
                match event {
                    Ok(MsgToContext::SettingsUpdated { settings }) => {
                        driver.remapper.apply_settings(settings);
                        println!("settings updated:");
                        commands::print_pair(&settings);
                    }
                    Ok(MsgToContext::Heartbeat { .. }) => {}
                    Err(e) => {
                        println!("coordinator connection lost: {}", e);
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    pump.await.ok();
    client.disconnect(false).await.ok();
    Ok(())
}

/// What the line handler wants the event loop to do next.
enum Flow {
    /// Keep reading.
    Continue,
    /// End the session.
    Quit,
}

/// Interactive session state.
struct Driver {
    /// The scripted host surface being driven.
    page: Arc<ScriptedPage>,
    /// The remapping engine attached to the page.
    remapper: Remapper,
    /// Editor receiving typed text and key presses.
    focus: Option<EditorId>,
}

impl Driver {
    /// Feed one key press through interception, applying the host-native
    /// effect when it is not suppressed.
    async fn press(&self, editor: EditorId, event: &KeyEvent) -> Outcome {
        let outcome = self.remapper.on_key(editor, event).await;
        if !outcome.suppresses() {
            self.page.apply_native(editor, event);
        }
        outcome
    }

    /// Dispatch one stdin line.
    async fn handle_line(&mut self, conn: &mut Connection, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        if let Some(rest) = line.strip_prefix('/') {
            return self.handle_command(conn, rest).await;
        }
        let Some(editor) = self.focus else {
            println!("no editors; /add one first");
            return Flow::Continue;
        };
        if let Some(event) = parse_press(line) {
            let outcome = self.press(editor, &event).await;
            println!("{} -> {}", event, outcome);
        } else {
            self.page.type_text(editor, line);
        }
        self.show_editor(editor);
        Flow::Continue
    }

    /// Dispatch one slash command.
    async fn handle_command(&mut self, conn: &mut Connection, rest: &str) -> Flow {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        match parts.as_slice() {
            ["quit" | "q"] => return Flow::Quit,
            ["help"] => print_help(),
            ["state"] => self.show_state().await,
            ["settings"] => commands::print_pair(&self.remapper.settings()),
            ["add"] => {
                let id = self.page.add_editor();
                if self.focus.is_none() {
                    self.focus = Some(id);
                }
                println!("added editor {}", id.0);
            }
            ["rm", raw] => match raw.parse::<u64>() {
                Ok(n) => {
                    let id = EditorId(n);
                    self.page.remove_editor(id);
                    if self.focus == Some(id) {
                        self.focus = self.page.editors().await.first().copied();
                    }
                    println!("removed editor {}", n);
                }
                Err(_) => println!("usage: /rm <editor-id>"),
            },
            ["focus", raw] => match raw.parse::<u64>() {
                Ok(n) => {
                    self.focus = Some(EditorId(n));
                    println!("focused editor {}", n);
                }
                Err(_) => println!("usage: /focus <editor-id>"),
            },
            ["control", state @ ("on" | "off")] => {
                if let Some(editor) = self.focus {
                    self.page
                        .set_control(editor, ControlSelector::TestId, *state == "on");
                    println!("send control {} on editor {}", state, editor.0);
                } else {
                    println!("no focused editor");
                }
            }
            ["failclicks", state @ ("on" | "off")] => {
                self.page.fail_clicks(*state == "on");
                println!("control clicks now {}", if *state == "on" { "fail" } else { "succeed" });
            }
            ["set", slot_raw, chord_raw] => {
                match (ActionSlot::from_spec(slot_raw), Chord::parse(chord_raw)) {
                    (Some(slot), Some(chord)) => {
                        let mut pair = self.remapper.settings();
                        if let Some(replacement) = pair.assign(slot, chord) {
                            println!("{} moved to {}", slot.other(), replacement);
                        }
                        // Applied locally when SETTINGS_UPDATED comes back.
                        if let Err(e) = conn.set_settings(pair).await {
                            println!("set failed: {}", e);
                        }
                    }
                    _ => println!("usage: /set <send|newline> <chord>"),
                }
            }
            _ => println!("unknown command; /help lists them"),
        }
        Flow::Continue
    }

    /// Print one editor's buffer and send history size.
    fn show_editor(&self, editor: EditorId) {
        let sent = self.page.sent_messages(editor);
        print!("  buffer: {:?}", self.page.buffer(editor));
        if let Some(last) = sent.last() {
            print!("  [{} sent, last {:?}]", sent.len(), last);
        }
        println!();
    }

    /// Print every editor with its buffer, history, and dispatch counts.
    async fn show_state(&self) {
        let editors = self.page.editors().await;
        if editors.is_empty() {
            println!("no editors");
            return;
        }
        for id in editors {
            let marker = if self.focus == Some(id) { "*" } else { " " };
            println!(
                "{} editor {}: buffer {:?}, {} sent, {} clicks, {} synthetic",
                marker,
                id.0,
                self.page.buffer(id),
                self.page.sent_messages(id).len(),
                self.page.clicks().iter().filter(|(e, _)| *e == id).count(),
                self.page.dispatched(id).len(),
            );
            for msg in self.page.sent_messages(id) {
                println!("      sent: {:?}", msg);
            }
        }
    }
}

/// Interpret a line as a key press when it reads like a key spec.
///
/// Modifier combinations, Enter aliases, and single characters press keys;
/// everything else is literal text for the composer.
fn parse_press(line: &str) -> Option<KeyEvent> {
    let event = KeyEvent::parse(line)?;
    let keylike = match &event.key {
        Key::Enter => true,
        Key::Other(s) => s.chars().count() == 1,
    };
    if keylike || line.contains('+') {
        Some(event)
    } else {
        None
    }
}

/// Print the line and slash-command reference.
fn print_help() {
    println!("lines:");
    println!("  <text>                type text into the focused editor");
    println!("  <key spec>            press a key, e.g. enter, shift+enter, a");
    println!("commands:");
    println!("  /set <slot> <chord>   change a slot through the coordinator");
    println!("  /settings             show the pair this context is using");
    println!("  /state                show every editor's buffer and history");
    println!("  /add                  add an editor");
    println!("  /rm <id>              remove an editor");
    println!("  /focus <id>           focus an editor");
    println!("  /control on|off       give the focused editor a send control");
    println!("  /failclicks on|off    make control clicks fail");
    println!("  /quit                 exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_lines_are_distinguished_from_text() {
        assert!(parse_press("enter").is_some());
        assert!(parse_press("Return").is_some());
        assert!(parse_press("shift+enter").is_some());
        assert!(parse_press("a").is_some());
        assert!(parse_press("hello there").is_none());
        assert!(parse_press("hello").is_none());
        // A bad modifier never becomes a press.
        assert!(parse_press("bogus+enter").is_none());
    }
}
