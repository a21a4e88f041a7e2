//! Built-in prompt bodies, used when the prompts directory lacks a file.

use super::TemplateKey;

/// Default body text for a template.
pub fn default_body(key: TemplateKey) -> &'static str {
    match key {
        TemplateKey::Summarizer => {
            "Role: Email summarizer.\n\
             Summarize the email below for a busy reader. Capture who is writing, what they want, \
             and any deadlines. Respond with a JSON object with the fields \"summary\" (string), \
             \"key_points\" (array of strings) and \"action_items\" (array of strings)."
        }
        TemplateKey::NeedsResponse => {
            "Role: Inbox gatekeeper.\n\
             Given the email summary below, decide whether the email needs a reply. Newsletters, \
             receipts and automated notices do not. Respond with a JSON object with the fields \
             \"needs_response\" (exactly \"respond\" or \"no_response_needed\") and \"reason\" (string)."
        }
        TemplateKey::Categorizer => {
            "Role: Request categorizer.\n\
             Decide whether the request in the email below should be declined or moved forward. \
             Respond with a JSON object with the fields \"decision\" (exactly \"decline\" or \
             \"move_forward\") and \"reason\" (string)."
        }
        TemplateKey::MeetingRequestDecider => {
            "Role: Scheduling detector.\n\
             Decide whether the email below is solely a request to schedule a meeting. Respond \
             with a JSON object with the fields \"decision\" (\"yes\" or \"no\") and \"reason\" (string)."
        }
        TemplateKey::Editor => {
            "Role: Editorial analyst.\n\
             Compare the draft email with the version a human edited and explain what changed and \
             why it likely changed. Respond with a JSON object with the fields \"summary\" (string), \
             \"changes\" (array of objects with \"kind\", \"original\", \"edited\" and \"rationale\"), \
             \"tone_shift\" (string or null) and \"learnings\" (array of strings)."
        }
        TemplateKey::DeclineWriter => {
            "Role: Email writer.\n\
             Write a short, polite reply that declines the request in the email below. Thank the \
             sender and keep the door open. Output only the email body."
        }
        TemplateKey::ScheduleWriter => {
            "Role: Email writer.\n\
             Write a short reply that accepts the meeting request in the email below and proposes \
             next steps for finding a time. Output only the email body."
        }
        TemplateKey::GeneralWriter => {
            "Role: Email writer.\n\
             Write a helpful, concise reply to the email below that moves the conversation \
             forward. Output only the email body."
        }
    }
}
