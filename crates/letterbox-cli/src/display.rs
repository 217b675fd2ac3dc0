//! Terminal rendering for archived letters, drafts, and workflow notifications.

use letterbox_core::{Importance, LetterDraft, LetterField, LetterRecord};
use letterbox_workflow::{FailureKind, Notification, Phase};

const LABEL_WIDTH: usize = 18;
const BODY_PREVIEW_CHARS: usize = 72;

// ── Archive list ──

/// One-line summary card used by `list` and `search`.
pub fn card(letter: &LetterRecord) -> String {
    let tag = match letter.importance {
        Importance::Urgent => "[URGENT]",
        Importance::Normal => "[normal]",
    };
    let mut line = format!("{tag} {}", or_dash(&letter.subject));
    line.push_str(&format!("\n         from {}", or_dash(&letter.sender_service)));
    if !letter.letter_number.is_empty() {
        line.push_str(&format!("  No. {}", letter.letter_number));
    }
    if !letter.date.is_empty() {
        line.push_str(&format!("  dated {}", letter.date));
    }
    line.push_str(&format!("\n         id {}", letter.id));
    line
}

pub fn print_cards(letters: &[&LetterRecord], query: &str) {
    if letters.is_empty() {
        if query.is_empty() {
            println!("The archive is empty.");
        } else {
            println!("No letters match \"{query}\".");
        }
        return;
    }
    for letter in letters {
        println!("{}", card(letter));
        println!();
    }
    println!("{} letter(s)", letters.len());
}

// ── Detail view ──

/// Print every field of an archived letter, grouped by section.
pub fn print_letter(letter: &LetterRecord) {
    println!("=== {} ===", or_dash(&letter.subject));
    println!();

    println!("Routing");
    for field in [LetterField::SenderService, LetterField::ReceiverService] {
        print_field(field, letter.field(field));
    }
    println!();

    println!("Reference");
    for field in [LetterField::LetterNumber, LetterField::Date, LetterField::Importance] {
        print_field(field, letter.field(field));
    }
    println!();

    println!("Body");
    if letter.body.is_empty() {
        println!("  -");
    } else {
        for line in letter.body.lines() {
            println!("  {line}");
        }
    }
    println!();

    println!("Record");
    println!("  {:<LABEL_WIDTH$} {}", "id", letter.id);
    println!("  {:<LABEL_WIDTH$} {}", "createdAt", letter.created_at.to_rfc3339());
    println!(
        "  {:<LABEL_WIDTH$} {}",
        "image",
        if letter.has_image() { "attached" } else { "none" }
    );
}

/// Print the draft the operator is about to archive.
pub fn print_draft(draft: &LetterDraft) {
    println!("Draft");
    print_field(LetterField::Subject, &draft.subject);
    print_field(LetterField::SenderService, &draft.sender_service);
    print_field(LetterField::ReceiverService, &draft.receiver_service);
    print_field(LetterField::LetterNumber, &draft.letter_number);
    print_field(LetterField::Date, &draft.date);
    print_field(LetterField::Importance, draft.importance.as_str());
    print_field(LetterField::Body, &preview(&draft.body));
    println!();
}

fn print_field(field: LetterField, value: &str) {
    println!("  {:<LABEL_WIDTH$} {}", field.as_str(), or_dash(value));
}

// ── Notifications ──

/// Text for a workflow notification, or `None` when it is not worth showing.
pub fn notification_line(n: &Notification) -> Option<String> {
    match n {
        Notification::PhaseChanged { to, .. } => match to {
            Phase::Uploading => Some("  uploading scan...".into()),
            Phase::Processing => Some("  extracting fields...".into()),
            _ => None,
        },
        Notification::ReviewReady { file_name } => Some(format!("  fields extracted from {file_name}")),
        Notification::ExtractionFailed { kind, message } => {
            let prefix = match kind {
                FailureKind::NetworkUnreachable => "service unreachable",
                FailureKind::Timeout => "timed out",
                FailureKind::Abandoned => "cancelled",
                FailureKind::Service | FailureKind::Other => "extraction failed",
            };
            Some(format!("error: {prefix}: {message}"))
        }
        Notification::Saved { id, subject } => Some(format!("  saved \"{}\" as {id}", or_dash(subject))),
        Notification::SaveFailed { message } => Some(format!("error: could not save letter: {message}")),
        Notification::Rejected { reason } => Some(format!("error: {reason}")),
    }
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() { "-" } else { s }
}

fn preview(s: &str) -> String {
    let first = s.lines().next().unwrap_or_default();
    if first.chars().count() > BODY_PREVIEW_CHARS || s.lines().nth(1).is_some() {
        let cut: String = first.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        first.to_string()
    }
}
