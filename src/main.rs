fn main() {
    if let Err(e) = speaker_labeler_lib::run() {
        eprintln!("speaker-labeler: {}", e);
        std::process::exit(1);
    }
}
