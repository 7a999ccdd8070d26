//! Line-oriented front-end: reads commands from stdin, prints events to stdout.

use std::path::PathBuf;

use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::annotation::{format_time, AnnotationStore, EditState, FilterMode, SegmentId};
use crate::notify::{StatusLevel, UiEvent};
use crate::remote::{IdentifyOptions, UploadPayload};
use crate::settings::Settings;

const HELP: &str = "\
commands:
  load <path>                      load a video on the server
  transcribe                       run transcription
  identify [denoise] [prop] [thr]  run speaker identification
  segments                         list segments under the current filter
  filter all|labeled|unlabeled     change the filter
  speaker add <name>               add a speaker
  speaker rm <name>                remove a speaker
  speakers                         list speakers
  assign <id> <name>               assign a speaker to a segment
  edit <id>                        start editing a segment's text
  draft <id> <text>                replace the draft text
  save <id>                        save the edited text
  seek <id>                        show where playback would jump
  upload <file.json>               upload a segments file
  export                           download labels to speaker_labels.json
  resync                           reload segments from the server
  status                           show the progress indicator
  dismiss                          close the progress indicator
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load(String),
    Transcribe,
    Identify(Option<IdentifyArgs>),
    Segments,
    Filter(FilterMode),
    AddSpeaker(String),
    RemoveSpeaker(String),
    Speakers,
    Assign(SegmentId, String),
    Edit(SegmentId),
    Draft(SegmentId, String),
    Save(SegmentId),
    Seek(SegmentId),
    Upload(PathBuf),
    Export,
    Resync,
    Status,
    Dismiss,
    Help,
    Quit,
}

/// Identification overrides given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifyArgs {
    pub denoise: bool,
    pub denoise_proportion: Option<f64>,
    pub verification_threshold: Option<f64>,
}

impl IdentifyArgs {
    fn apply(&self, mut base: IdentifyOptions) -> IdentifyOptions {
        base.denoise = self.denoise;
        if let Some(p) = self.denoise_proportion {
            base.denoise_proportion = p;
        }
        if let Some(t) = self.verification_threshold {
            base.verification_threshold = t;
        }
        base
    }
}

fn parse_id(arg: Option<&str>) -> Result<SegmentId, String> {
    let arg = arg.ok_or("missing segment id")?;
    arg.parse()
        .map_err(|_| format!("invalid segment id: {}", arg))
}

fn parse_f64(arg: &str) -> Result<f64, String> {
    arg.parse().map_err(|_| format!("invalid number: {}", arg))
}

fn rest(line: &str, words: usize) -> String {
    line.split_whitespace()
        .skip(words)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };

    let cmd = match head {
        "load" => Command::Load(rest(line, 1)),
        "transcribe" => Command::Transcribe,
        "identify" => {
            let args: Vec<&str> = words.collect();
            if args.is_empty() {
                Command::Identify(None)
            } else {
                let denoise = match args[0] {
                    "denoise" | "on" | "true" => true,
                    "off" | "false" => false,
                    other => return Err(format!("expected denoise|off, got {}", other)),
                };
                Command::Identify(Some(IdentifyArgs {
                    denoise,
                    denoise_proportion: args.get(1).map(|a| parse_f64(a)).transpose()?,
                    verification_threshold: args.get(2).map(|a| parse_f64(a)).transpose()?,
                }))
            }
        }
        "segments" | "ls" => Command::Segments,
        "filter" => Command::Filter(words.next().unwrap_or("all").parse()?),
        "speaker" => match words.next() {
            Some("add") => Command::AddSpeaker(rest(line, 2)),
            Some("rm") | Some("remove") => Command::RemoveSpeaker(rest(line, 2)),
            Some("ls") | None => Command::Speakers,
            Some(other) => return Err(format!("unknown speaker command: {}", other)),
        },
        "speakers" => Command::Speakers,
        "assign" => Command::Assign(parse_id(words.next())?, rest(line, 2)),
        "edit" => Command::Edit(parse_id(words.next())?),
        "draft" => Command::Draft(parse_id(words.next())?, rest(line, 2)),
        "save" => Command::Save(parse_id(words.next())?),
        "seek" => Command::Seek(parse_id(words.next())?),
        "upload" => {
            let path = rest(line, 1);
            if path.is_empty() {
                return Err("Please select a file first".to_string());
            }
            Command::Upload(PathBuf::from(path))
        }
        "export" => Command::Export,
        "resync" => Command::Resync,
        "status" => Command::Status,
        "dismiss" => Command::Dismiss,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {} (try 'help')", other)),
    };
    Ok(cmd)
}

fn print_event(event: UiEvent) {
    match event {
        UiEvent::Status(msg) => {
            let tag = match msg.level {
                StatusLevel::Info => "info",
                StatusLevel::Success => "ok",
                StatusLevel::Warning => "warn",
                StatusLevel::Error => "error",
            };
            println!("[{}] {}", tag, msg.text);
        }
        UiEvent::ProgressShown { title, message } => {
            if message.is_empty() {
                println!("... {}", title);
            } else {
                println!("... {} {}", title, message);
            }
        }
        UiEvent::VideoLoaded { url, filename } => println!("video: {} <{}>", filename, url),
        UiEvent::ProgressHidden | UiEvent::SegmentsChanged | UiEvent::SpeakersChanged => {}
    }
}

async fn print_segments(store: &AnnotationStore) {
    let all = store.segments().await;
    if all.is_empty() {
        println!("No segments found");
        return;
    }
    let visible = store.visible_segments().await;
    for seg in &visible {
        let marker = match store.edit_state(seg.id).await {
            EditState::Editing { draft } => format!("  (editing: {})", draft),
            EditState::Viewing => String::new(),
        };
        let speaker = if seg.is_labeled() {
            seg.speaker.as_str()
        } else {
            "Unassigned"
        };
        println!(
            "[{}] {} - {} ({:.1}s)  {:<12} {}{}",
            seg.id,
            format_time(seg.start),
            format_time(seg.end),
            seg.duration(),
            speaker,
            seg.text.trim(),
            marker
        );
    }
    println!(
        "{} of {} segments ({:?}){}",
        visible.len(),
        all.len(),
        store.filter().await,
        if store.is_offline().await { ", offline sample" } else { "" }
    );
}

/// Errors were already reported as status events; only log them here.
async fn execute(store: AnnotationStore, settings: Settings, cmd: Command) {
    let result: Result<(), String> = match cmd {
        Command::Load(path) => store.load_video(&path).await.map(|_| ()).map_err(|e| e.to_string()),
        Command::Transcribe => store.transcribe().await.map(|_| ()).map_err(|e| e.to_string()),
        Command::Identify(args) => {
            let options = args
                .map(|a| a.apply(settings.identify))
                .unwrap_or(settings.identify);
            store
                .identify_speakers(options)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        Command::Segments => {
            print_segments(&store).await;
            Ok(())
        }
        Command::Filter(mode) => {
            store.set_filter(mode).await;
            print_segments(&store).await;
            Ok(())
        }
        Command::AddSpeaker(name) => store.add_speaker(&name).await.map(|_| ()).map_err(|e| e.to_string()),
        Command::RemoveSpeaker(name) => {
            if !store.remove_speaker(&name).await {
                println!("no speaker named \"{}\"", name);
            }
            Ok(())
        }
        Command::Speakers => {
            for speaker in store.speakers().await {
                println!("{}  ({})", speaker.name, speaker.description);
            }
            let unlisted = store.remote_only_speakers().await;
            if !unlisted.is_empty() {
                println!("on segments but not listed: {}", unlisted.join(", "));
            }
            Ok(())
        }
        Command::Assign(id, name) => store.assign_speaker(id, &name).await.map_err(|e| e.to_string()),
        Command::Edit(id) => store.start_edit(id).await.map_err(|e| e.to_string()),
        Command::Draft(id, text) => {
            if !store.update_draft(id, &text).await {
                println!("segment {} is not being edited (use 'edit {}' first)", id, id);
            }
            Ok(())
        }
        Command::Save(id) => match store.save_edit(id).await {
            Ok(false) => {
                println!("segment {} is not being edited", id);
                Ok(())
            }
            Ok(true) => Ok(()),
            Err(e) => Err(e.to_string()),
        },
        Command::Seek(id) => {
            match store.seek_target(id).await {
                Some(start) => println!("seek {} ({:.2}s) and play", format_time(start), start),
                None => println!("segment {} not found", id),
            }
            Ok(())
        }
        Command::Upload(path) => match UploadPayload::from_path(&path) {
            Ok(payload) => store
                .upload_segments_file(payload)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Err(e) => {
                println!("[error] cannot read {}: {}", path.display(), e);
                Err(e.to_string())
            }
        },
        Command::Export => store
            .export_labels(&settings.export_dir())
            .await
            .map(|path| println!("wrote {}", path.display()))
            .map_err(|e| e.to_string()),
        Command::Resync => store.resync().await.map(|_| ()).map_err(|e| e.to_string()),
        Command::Status => {
            let snapshot = store.jobs().snapshot().await;
            println!(
                "{} | {:?} {} ({}s left)",
                settings.server_url,
                snapshot.state,
                snapshot.title.unwrap_or_default(),
                snapshot.remaining_ms / 1000
            );
            Ok(())
        }
        Command::Dismiss => {
            store.jobs().dismiss().await;
            Ok(())
        }
        Command::Help | Command::Quit => Ok(()),
    };
    if let Err(e) = result {
        debug!("[console] command failed: {}", e);
    }
}

/// Run the interactive session until stdin closes or `quit` is entered.
///
/// Each command runs as its own task, so edits can be made while a job is in flight.
pub async fn run_console(
    store: AnnotationStore,
    settings: Settings,
    mut events: UnboundedReceiver<UiEvent>,
) -> Result<(), String> {
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(event);
        }
    });

    println!("speaker-labeler connected to {} (type 'help')", settings.server_url);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => println!("{}", HELP),
            Ok(cmd) => {
                tokio::spawn(execute(store.clone(), settings.clone(), cmd));
            }
            Err(e) => println!("[error] {}", e),
        }
    }

    store.jobs().dismiss().await;
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_free_text() {
        assert_eq!(
            parse_command("load /videos/my clip.mp4"),
            Ok(Command::Load("/videos/my clip.mp4".into()))
        );
        assert_eq!(
            parse_command("assign 3 Dr. A"),
            Ok(Command::Assign(3, "Dr. A".into()))
        );
        assert_eq!(
            parse_command("draft 1 Patient has arrived."),
            Ok(Command::Draft(1, "Patient has arrived.".into()))
        );
        assert_eq!(
            parse_command("speaker add Nurse Kim"),
            Ok(Command::AddSpeaker("Nurse Kim".into()))
        );
        assert_eq!(parse_command("filter unlabeled"), Ok(Command::Filter(FilterMode::Unlabeled)));
    }

    #[test]
    fn parses_identify_overrides() {
        assert_eq!(parse_command("identify"), Ok(Command::Identify(None)));
        let Ok(Command::Identify(Some(args))) = parse_command("identify denoise 0.3") else {
            panic!("expected identify args");
        };
        let options = args.apply(IdentifyOptions::default());
        assert!(options.denoise);
        assert_eq!(options.denoise_proportion, 0.3);
        assert_eq!(options.verification_threshold, 0.2);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(parse_command("assign x Nurse").is_err());
        assert!(parse_command("save").is_err());
        assert!(parse_command("filter speakers").is_err());
        assert!(parse_command("identify maybe").is_err());
        assert!(parse_command("upload").is_err());
        assert!(parse_command("frobnicate").is_err());
    }
}
