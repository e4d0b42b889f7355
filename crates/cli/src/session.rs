//! Interactive studio session.
//!
//! Generation runs in spawned tasks that report back over a channel; only the
//! input loop touches the [`Studio`], so the prompt stays responsive while a
//! scene renders.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use generation::GenerationBackend;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use studio::{
    CancellationToken, Character, CharacterDraft, CharacterId, EducationKind, Precondition, Scene,
    Studio,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const COMMANDS: &str = "\
Commands:
  add <name> | <description>   design a new character
  cast                         list the characters
  rm <number|id>               remove a character
  scene <what happens>         film a scene with the first characters
  cancel                       stop waiting for the scene being filmed
  scenes                       list the timeline, newest first
  save <number> [dir]          write SCENE <number> to disk
  play <number>                open SCENE <number> in the browser
  text <kind> [topic]          teacher material (lesson, emotion, scenario, help)
  copy                         copy the last text to the clipboard
  dismiss                      hide the error banner
  help                         show this list
  quit                         leave the studio";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { name: String, description: String },
    Cast,
    Remove(CharacterRef),
    Scene(String),
    Cancel,
    Scenes,
    Save { number: usize, dir: Option<PathBuf> },
    Play(usize),
    Text { kind: EducationKind, topic: String },
    Copy,
    Dismiss,
    Help,
    Quit,
}

/// A character picked by list position (1-based) or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterRef {
    Number(usize),
    Id(CharacterId),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> std::result::Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "add" => {
            let (name, description) = rest
                .split_once('|')
                .ok_or("usage: add <name> | <description>")?;
            Command::Add {
                name: name.trim().to_string(),
                description: description.trim().to_string(),
            }
        }
        "cast" | "ls" => Command::Cast,
        "rm" | "remove" => {
            if let Ok(number) = rest.parse::<usize>() {
                Command::Remove(CharacterRef::Number(number))
            } else {
                let id = rest
                    .parse::<CharacterId>()
                    .map_err(|_| "usage: rm <number|id>".to_string())?;
                Command::Remove(CharacterRef::Id(id))
            }
        }
        "scene" => Command::Scene(rest.to_string()),
        "cancel" => Command::Cancel,
        "scenes" => Command::Scenes,
        "save" => {
            let mut args = rest.split_whitespace();
            let number = scene_number(args.next(), "usage: save <number> [dir]")?;
            Command::Save {
                number,
                dir: args.next().map(PathBuf::from),
            }
        }
        "play" => Command::Play(scene_number(Some(rest), "usage: play <number>")?),
        "text" => {
            let (kind, topic) = match rest.split_once(char::is_whitespace) {
                Some((kind, topic)) => (kind, topic.trim()),
                None => (rest, ""),
            };
            Command::Text {
                kind: kind.parse()?,
                topic: topic.to_string(),
            }
        }
        "copy" => Command::Copy,
        "dismiss" => Command::Dismiss,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}', type 'help'")),
    };
    Ok(Some(command))
}

fn scene_number(arg: Option<&str>, usage: &str) -> std::result::Result<usize, String> {
    arg.and_then(|a| a.trim().parse().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| usage.to_string())
}

enum Event {
    Character(studio::Result<Character>),
    Scene(studio::Result<Scene>),
    Text(String),
}

enum Input {
    Line(Option<String>),
    Event(Event),
}

pub struct Session {
    studio: Studio,
    backend: Arc<dyn GenerationBackend>,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    scene_cancel: Option<CancellationToken>,
}

impl Session {
    pub fn new(studio: Studio, backend: Arc<dyn GenerationBackend>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(16);
        Self {
            studio,
            backend,
            events_tx,
            events_rx,
            scene_cancel: None,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        println!("ToonCraft studio ({})", self.backend.name());
        println!("{COMMANDS}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            prompt();
            let input = tokio::select! {
                line = lines.next_line() => Input::Line(line.context("Failed to read input")?),
                Some(event) = self.events_rx.recv() => Input::Event(event),
            };
            match input {
                Input::Line(None) => break,
                Input::Line(Some(line)) => match parse_command(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => self.execute(command),
                    Ok(None) => {}
                    Err(usage) => println!("{usage}"),
                },
                Input::Event(event) => self.apply(event),
            }
        }

        if let Some(cancel) = self.scene_cancel.take() {
            cancel.cancel();
        }
        Ok(())
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Add { name, description } => self.add_character(name, description),
            Command::Cast => self.print_cast(),
            Command::Remove(which) => self.remove_character(which),
            Command::Scene(prompt) => self.film_scene(prompt),
            Command::Cancel => match &self.scene_cancel {
                Some(cancel) => cancel.cancel(),
                None => println!("No scene is being filmed."),
            },
            Command::Scenes => self.print_scenes(),
            Command::Save { number, dir } => self.save_scene(number, dir),
            Command::Play(number) => self.play_scene(number),
            Command::Text { kind, topic } => self.generate_text(kind, topic),
            Command::Copy => self.copy_text(),
            Command::Dismiss => self.studio.dismiss_banner(),
            Command::Help => println!("{COMMANDS}"),
            Command::Quit => {}
        }
    }

    fn add_character(&mut self, name: String, description: String) {
        if refuse_if_busy(self.studio.character_form.in_flight()) {
            return;
        }
        self.studio.character_form.draft = CharacterDraft::new(name, description);
        let creation = match self.studio.begin_character() {
            Ok(creation) => creation,
            Err(precondition) => {
                println!("{precondition}");
                return;
            }
        };
        println!("Designing {}...", creation.name());

        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = creation.run(backend.as_ref()).await;
            if events.send(Event::Character(outcome)).await.is_err() {
                debug!("session closed before the character was ready");
            }
        });
    }

    fn remove_character(&mut self, which: CharacterRef) {
        let id = match which {
            CharacterRef::Id(id) => Some(id),
            CharacterRef::Number(n) => n
                .checked_sub(1)
                .and_then(|i| self.studio.characters().iter().nth(i))
                .map(|c| c.id),
        };
        match id.and_then(|id| self.studio.remove_character(id)) {
            Some(character) => println!("{} left the cast.", character.name),
            None => println!("No such character."),
        }
    }

    fn film_scene(&mut self, prompt: String) {
        if refuse_if_busy(self.studio.composer.in_flight()) {
            return;
        }
        self.studio.composer.prompt = prompt;
        let attempt = match self.studio.begin_scene() {
            Ok(attempt) => attempt,
            Err(precondition) => {
                println!("{precondition}");
                return;
            }
        };
        let (_, omitted) = self.studio.scene_cast();
        println!(
            "Filming with {}. This can take a few minutes; type 'cancel' to stop waiting.",
            attempt.character_names().join(", ")
        );
        if omitted > 0 {
            println!("({omitted} more character(s) will not appear in this scene.)");
        }

        let cancel = CancellationToken::new();
        self.scene_cancel = Some(cancel.clone());
        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = attempt.run(backend.as_ref(), &cancel).await;
            if events.send(Event::Scene(outcome)).await.is_err() {
                debug!("session closed before the scene was ready");
            }
        });
    }

    fn generate_text(&mut self, kind: EducationKind, topic: String) {
        if refuse_if_busy(self.studio.text_panel.in_flight()) {
            return;
        }
        self.studio.text_panel.open(kind);
        self.studio.text_panel.topic = topic;
        let generation = match self.studio.begin_text() {
            Ok(generation) => generation,
            Err(precondition) => {
                println!("{precondition} (hint: {})", kind.placeholder());
                return;
            }
        };
        println!("{}...", kind.title());

        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let text = generation.run(backend.as_ref()).await;
            if events.send(Event::Text(text)).await.is_err() {
                debug!("session closed before the text was ready");
            }
        });
    }

    fn apply(&mut self, event: Event) {
        println!();
        match event {
            Event::Character(outcome) => match self.studio.finish_character(outcome) {
                Ok(id) => {
                    if let Some(character) = self.studio.characters().get(id) {
                        println!("{} joined the cast.", character.name);
                    }
                }
                Err(err) => warn!(error = %err, "character not created"),
            },
            Event::Scene(outcome) => {
                self.scene_cancel = None;
                match self.studio.finish_scene(outcome) {
                    Ok(_) => {
                        let count = self.studio.scenes().len();
                        println!("SCENE {count} is ready. Use 'play {count}' or 'save {count}'.");
                    }
                    Err(_) => {
                        if let Some(message) = self.studio.composer.local_error() {
                            println!("{message}");
                        }
                    }
                }
            }
            Event::Text(text) => {
                self.studio.finish_text(text);
                if let Some(text) = self.studio.text_panel.result() {
                    println!("{text}");
                }
            }
        }
        if let Some(message) = self.studio.banner().message() {
            println!("[!] {message} (type 'dismiss' to hide)");
        }
    }

    fn print_cast(&self) {
        let characters = self.studio.characters();
        if characters.is_empty() {
            println!("The cast is empty. Add a character with 'add <name> | <description>'.");
            return;
        }
        let (cast, _) = self.studio.scene_cast();
        for (i, character) in characters.iter().enumerate() {
            let preview: String = character.image.display_handle().chars().take(40).collect();
            let marker = if i < cast.len() { "*" } else { " " };
            println!(
                "{marker}{}. {} - {} [{}...]",
                i + 1,
                character.name,
                character.description,
                preview
            );
        }
        println!("(* appears in the next scene)");
    }

    fn print_scenes(&self) {
        let timeline = self.studio.scenes();
        if timeline.is_empty() {
            println!("No scenes yet.");
            return;
        }
        for (position, scene) in timeline.iter().enumerate() {
            let number = timeline.number_of(position).unwrap_or_default();
            println!(
                "SCENE {number}: {} ({}, {}, {} bytes, {})",
                scene.prompt,
                scene.characters.join(", "),
                scene.status,
                scene.video.len(),
                scene.created_at.format("%H:%M:%S")
            );
        }
    }

    fn save_scene(&self, number: usize, dir: Option<PathBuf>) {
        let Some(scene) = self.studio.scenes().by_number(number) else {
            println!("No SCENE {number}.");
            return;
        };
        let dir = dir.unwrap_or_else(|| PathBuf::from("."));
        match scene.save_to_dir(&dir) {
            Ok(path) => println!("Saved {}", path.display()),
            Err(err) => println!("Could not save SCENE {number}: {err}"),
        }
    }

    fn play_scene(&self, number: usize) {
        let Some(scene) = self.studio.scenes().by_number(number) else {
            println!("No SCENE {number}.");
            return;
        };
        let dir = std::env::temp_dir().join("tooncraft");
        let path = match scene.save_to_dir(&dir) {
            Ok(path) => path,
            Err(err) => {
                println!("Could not prepare SCENE {number}: {err}");
                return;
            }
        };
        debug!(handle = %scene.video.handle(), path = %path.display(), "opening scene");
        if let Err(err) = webbrowser::open(&path.to_string_lossy()) {
            println!("Could not open a player: {err}. The video is at {}", path.display());
        }
    }

    fn copy_text(&self) {
        let Some(text) = self.studio.text_panel.result() else {
            println!("Nothing to copy yet.");
            return;
        };
        let mut stdout = std::io::stdout();
        let copied = write!(stdout, "\x1b]52;c;{}\x07", STANDARD.encode(text))
            .and_then(|_| stdout.flush());
        match copied {
            Ok(()) => println!("Copied to the clipboard."),
            Err(err) => println!("Could not copy: {err}"),
        }
    }
}

/// The forms stay untouched while their request is in flight.
fn refuse_if_busy(in_flight: bool) -> bool {
    if in_flight {
        println!("{}", Precondition::Busy);
    }
    in_flight
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use generation::{InlineImage, ScriptedBackend};

    fn session(backend: ScriptedBackend) -> Session {
        Session::new(Studio::default(), Arc::new(backend))
    }

    #[tokio::test]
    async fn test_text_while_busy_keeps_panel() {
        let mut session = session(ScriptedBackend::new());
        session.execute(Command::Text {
            kind: EducationKind::LessonBrief,
            topic: "sharing".to_string(),
        });
        assert!(session.studio.text_panel.in_flight());

        session.execute(Command::Text {
            kind: EducationKind::EmotionCards,
            topic: "anger".to_string(),
        });
        assert_eq!(session.studio.text_panel.kind, EducationKind::LessonBrief);
        assert_eq!(session.studio.text_panel.topic, "sharing");
    }

    #[tokio::test]
    async fn test_add_while_busy_keeps_draft() {
        let mut session = session(ScriptedBackend::new());
        session.execute(Command::Add {
            name: "Robo".to_string(),
            description: "a blue robot".to_string(),
        });
        assert!(session.studio.character_form.in_flight());

        session.execute(Command::Add {
            name: "Kim".to_string(),
            description: "a red fox".to_string(),
        });
        assert_eq!(session.studio.character_form.draft.name, "Robo");
    }

    #[tokio::test]
    async fn test_scene_while_busy_keeps_prompt() {
        let backend = ScriptedBackend::new().with_image(InlineImage::png(vec![1]));
        let mut studio = Studio::default();
        studio.character_form.draft = CharacterDraft::new("Robo", "a blue robot");
        studio.create_character_now(&backend).await.unwrap();
        let mut session = Session::new(studio, Arc::new(backend));

        session.execute(Command::Scene("Robo waves hello".to_string()));
        assert!(session.studio.composer.in_flight());

        session.execute(Command::Scene("Robo jumps".to_string()));
        assert_eq!(session.studio.composer.prompt, "Robo waves hello");
    }

    #[test]
    fn test_print_cast_with_multibyte_mime_type() {
        let mut session = session(ScriptedBackend::new());
        session.apply(Event::Character(Ok(Character {
            id: CharacterId::new(),
            name: "Robo".to_string(),
            description: "a blue robot".to_string(),
            image: studio::ReferenceImage {
                mime_type: "image/jpegéééééééééééééééé".to_string(),
                data: vec![1, 2, 3],
            },
        })));
        assert_eq!(session.studio.characters().len(), 1);
        session.print_cast();
    }

    #[test]
    fn test_parse_add() {
        assert_eq!(
            parse_command("add Robo | a blue robot").unwrap(),
            Some(Command::Add {
                name: "Robo".to_string(),
                description: "a blue robot".to_string(),
            })
        );
        assert!(parse_command("add Robo").is_err());
    }

    #[test]
    fn test_parse_blank_and_unknown() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("dance").unwrap_err().contains("unknown command"));
    }

    #[test]
    fn test_parse_scene_keeps_prompt() {
        assert_eq!(
            parse_command("scene Robo waves hello").unwrap(),
            Some(Command::Scene("Robo waves hello".to_string()))
        );
        assert_eq!(
            parse_command("scene").unwrap(),
            Some(Command::Scene(String::new()))
        );
    }

    #[test]
    fn test_parse_remove() {
        assert_eq!(
            parse_command("rm 2").unwrap(),
            Some(Command::Remove(CharacterRef::Number(2)))
        );
        let id = CharacterId::new();
        assert_eq!(
            parse_command(&format!("rm {id}")).unwrap(),
            Some(Command::Remove(CharacterRef::Id(id)))
        );
        assert!(parse_command("rm robo").is_err());
    }

    #[test]
    fn test_parse_scene_numbers() {
        assert_eq!(
            parse_command("save 1 out").unwrap(),
            Some(Command::Save {
                number: 1,
                dir: Some(PathBuf::from("out")),
            })
        );
        assert_eq!(parse_command("play 3").unwrap(), Some(Command::Play(3)));
        assert!(parse_command("play 0").is_err());
        assert!(parse_command("save").is_err());
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(
            parse_command("text emotion dealing with anger").unwrap(),
            Some(Command::Text {
                kind: EducationKind::EmotionCards,
                topic: "dealing with anger".to_string(),
            })
        );
        assert_eq!(
            parse_command("text help").unwrap(),
            Some(Command::Text {
                kind: EducationKind::Help,
                topic: String::new(),
            })
        );
        assert!(parse_command("text poem cats").is_err());
    }
}
