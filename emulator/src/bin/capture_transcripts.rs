use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    for profile in TranscriptProfile::all() {
        record_profile(profile)?;
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    match profile.name() {
        "score" => record_score(&mut session),
        _ => record_drive(&mut session),
    }
}

fn record_drive(session: &mut Session) -> io::Result<()> {
    for command in [
        "help",
        "stages",
        "run",
        "advance 4s",
        "run",
        "advance 500ms",
        "run",
        "status",
        "remaining 0",
        "run",
        "advance soon",
        "reset",
        "play 250ms",
        "status",
    ] {
        let _ = session.handle_command(command)?;
    }
    Ok(())
}

fn record_score(session: &mut Session) -> io::Result<()> {
    for command in [
        "help play",
        "stages",
        "remaining 13",
        "run",
        "remaining 12.5",
        "run",
        "remaining 6",
        "run",
        "remaining -2.5",
        "run",
        "play 0ms",
        "reset",
        "play",
        "help launch",
    ] {
        let _ = session.handle_command(command)?;
    }
    Ok(())
}
