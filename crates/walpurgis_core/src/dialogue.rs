//! User-facing text.
//!
//! Every notice the bot sends is a [`Line`]; the active [`Persona`] decides how
//! it is worded. Switching persona affects every later notice immediately.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ArchiveError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Cute,
    VanGogh,
    Gentleman,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Cute, Persona::VanGogh, Persona::Gentleman];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Cute => "cute",
            Persona::VanGogh => "vangogh",
            Persona::Gentleman => "gentleman",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPersona(pub String);

impl FromStr for Persona {
    type Err = UnknownPersona;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cute" => Ok(Persona::Cute),
            "vangogh" => Ok(Persona::VanGogh),
            "gentleman" => Ok(Persona::Gentleman),
            other => Err(UnknownPersona(other.to_string())),
        }
    }
}

/// A notice, before wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    AskIfDaily { user: u64 },
    ProvideDayNumber { user: u64, msg_id: u64 },
    ParseError { msg_id: u64 },
    MultipleNumbers,
    CooldownActive { elapsed: String, remaining: String },
    AutoArchived { day: i64 },
    AutoArchivedSeries { days: String },
    CouldntParseReply,
    NoValidDayNumbers,
    MessageNotFound { msg_id: u64 },
    NoMediaFound,
    DayTakenResolveDupes { day: i64 },
    DayAlreadyArchived { day: i64 },
    SuccessfulMediaArchive { message_id: u64, day_list: String },
    NotEnoughSlots { day: i64, slots: usize, media_count: usize },
    SlotsFull { day: i64 },
    MismatchDaysAttachments,
    InvalidInput,
    NoDailyJohanFound { day: i64 },
    ProvideDayOrLink,
    InvalidMessageLink,
    NoEntryFound,
    ConfirmDeletion { days: String },
    DeletionCancelled,
    DeletionSuccess { days: String },
    Error { error: String },
    DailyReminder { user: u64, day: i64 },
    GapAlert { user: u64, day: i64, missing: i64 },
    VerificationPrompt { provided: i64 },
    VerificationDenied,
    VerificationAccepted { provided: i64 },
    NotArchived { msg_id: u64 },
    NoResponse,
    PersonaSwitched { persona: Persona },
    UnknownPersona { name: String },
}

impl Line {
    /// The notice to show for an error that ended an interaction.
    pub fn from_error(err: &ArchiveError) -> Line {
        match err {
            ArchiveError::Parse { .. } => Line::CouldntParseReply,
            ArchiveError::Ambiguity { .. } => Line::MultipleNumbers,
            ArchiveError::CooldownActive { elapsed, remaining } => Line::CooldownActive {
                elapsed: crate::error::format_delta(*elapsed),
                remaining: crate::error::format_delta(*remaining),
            },
            ArchiveError::DayConflict { day } => Line::DayTakenResolveDupes { day: *day },
            ArchiveError::SlotsExceeded { day } => Line::SlotsFull { day: *day },
            ArchiveError::NoAvailableSlots {
                day,
                requested,
                available,
            } => Line::NotEnoughSlots {
                day: *day,
                slots: *available,
                media_count: *requested,
            },
            ArchiveError::TransportTimeout { .. } => Line::NoResponse,
            ArchiveError::InvalidInput { .. } => Line::InvalidInput,
            other => Line::Error {
                error: other.to_string(),
            },
        }
    }
}

/// Join days as `3, 4, 5`.
pub fn day_list(days: &[i64]) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Holds the active persona and words lines with it.
#[derive(Debug, Default)]
pub struct Dialogue {
    active: RwLock<Persona>,
}

impl Dialogue {
    pub fn new(persona: Persona) -> Self {
        Self {
            active: RwLock::new(persona),
        }
    }

    pub fn persona(&self) -> Persona {
        *self.active.read()
    }

    /// Switch persona by name. Unknown names leave the active persona unchanged.
    pub fn set_persona(&self, name: &str) -> Result<Persona, UnknownPersona> {
        let persona: Persona = name.parse()?;
        *self.active.write() = persona;
        info!("Persona switched to {}", persona);
        Ok(persona)
    }

    pub fn say(&self, line: &Line) -> String {
        render(self.persona(), line)
    }
}

/// Word `line` in `persona`'s voice.
pub fn render(persona: Persona, line: &Line) -> String {
    use Persona::*;

    match line {
        Line::AskIfDaily { user } => match persona {
            Cute => format!("<@{user}> Hewwooo~ Is this a Daiwy Johan?! ✩°｡⋆⸜(ू｡•ω•｡) Pwease wepwy with the *boops youw nyose* day numbew, nya~! If nyot, wepwy 'no'. (=^-ω-^=)"),
            VanGogh => format!("<@{user}> Might this post be a Daily Johan? If so, kindly reply with the day number. If not, reply 'no'."),
            Gentleman => format!("<@{user}> Good sir, is this post a Daily Johan? If so, please reply with the day number. If not, reply 'no'."),
        },
        Line::ProvideDayNumber { user, msg_id } => match persona {
            Cute => format!("<@{user}> Yay!! Which day numbew is message {msg_id}, pookie? (˘_˘;)"),
            VanGogh => format!("<@{user}> Then pray tell, which day does message {msg_id} depict?"),
            Gentleman => format!("<@{user}> Splendid. Would you kindly provide the day number for message {msg_id}, sir?"),
        },
        Line::ParseError { msg_id } => match persona {
            Cute => format!("Oh no oopsies! (⁄ ⁄•⁄ω⁄•⁄ ⁄) I failed to parse a valid day number from message {msg_id}."),
            VanGogh => format!("Alas, I cannot discern the number from message {msg_id}."),
            Gentleman => format!("Pardon me, I was unable to parse a valid day number from message {msg_id}."),
        },
        Line::MultipleNumbers => match persona {
            Cute => "My snuggy wuggy bear, are u trying to catch up dailies? :Flirt: Please manually submit it.".to_string(),
            VanGogh => "Multiple figures appear! I'm perplexed. Please help clarify the days.".to_string(),
            Gentleman => "There appear to be multiple numbers. Could you kindly submit them manually?".to_string(),
        },
        Line::CooldownActive { elapsed, remaining } => match persona {
            Cute => format!("Pookie, you posted only {elapsed} ago. I can't auto-archive for another {remaining}... please manually submit if it's a Daily Johan :heart_eyes:"),
            VanGogh => format!("I sense a recent creation, only {elapsed} past. For {remaining} more I cannot tell if it is a Daily Johan; kindly submit it by hand if so."),
            Gentleman => format!("It seems you posted rather recently, {elapsed} ago. Automatic archiving resumes in {remaining}; do submit manually if this is a Daily Johan."),
        },
        Line::AutoArchived { day } => match persona {
            Cute => format!("I automatically archived Day {day} for you!"),
            VanGogh => format!("I have captured Day {day} in our records."),
            Gentleman => format!("I've successfully archived Day {day} for you, good sir."),
        },
        Line::AutoArchivedSeries { days } => match persona {
            Cute => format!("I automatically archived a series of days: {days}!"),
            VanGogh => format!("I have captured a series of days: {days} in our records."),
            Gentleman => format!("I've successfully archived a series of days: {days} for you, good sir."),
        },
        Line::CouldntParseReply => match persona {
            Cute => "I- I'm sowwy!!! I couldn't parse a day number from your reply (￣▽￣*)ゞ".to_string(),
            VanGogh => "Forgive me, but I couldn't glean a day number from your reply.".to_string(),
            Gentleman => "My apologies, but I could not understand the day number from your response.".to_string(),
        },
        Line::NoValidDayNumbers => match persona {
            Cute => "Oopsies! I couldn't find any valid day numbers in your input... could you double-check?".to_string(),
            VanGogh => "Alas, I found no valid day numbers in your input. Might you try again?".to_string(),
            Gentleman => "I couldn't find valid day numbers in your input. Might you recheck?".to_string(),
        },
        Line::MessageNotFound { msg_id } => match persona {
            Cute => format!("I-I'm so sowwy! I can't find the message with ID {msg_id}. Can you check it again?"),
            VanGogh | Gentleman => format!("I regret to inform you that I cannot locate the message with ID {msg_id}."),
        },
        Line::NoMediaFound => match persona {
            Cute => "UwU no media found on that message... Could you try again, pookie?".to_string(),
            VanGogh => "There appears to be no media attached. Could you confirm, my friend?".to_string(),
            Gentleman => "It seems there is no media attached to that message. Could you verify, sir?".to_string(),
        },
        Line::DayTakenResolveDupes { day } => match persona {
            Cute => format!("Day {day} already has a different Daily Johan... please resolve duplicates manually sir."),
            VanGogh => format!("Day {day} already contains another record. Please resolve this conflict manually."),
            Gentleman => format!("Day {day} already contains another record. Manual resolution is required, sir."),
        },
        Line::DayAlreadyArchived { day } => match persona {
            Cute => format!("Oops! Day {day} already has a Daily Johan archived. No new archive needed."),
            VanGogh => format!("Alas, day {day} already contains a Daily Johan record."),
            Gentleman => format!("Good day, sir. Day {day} already has an archived Daily Johan."),
        },
        Line::SuccessfulMediaArchive { message_id, day_list } => match persona {
            Cute => format!("Yay! Archived message {message_id} for days: {day_list}. You did it!✨"),
            VanGogh => format!("Success! I have archived message {message_id} for days: {day_list}."),
            Gentleman => format!("Marvelous! I've archived message {message_id} for days: {day_list}."),
        },
        Line::NotEnoughSlots { day, slots, media_count } => match persona {
            Cute => format!("Oh noes, day {day} only has {slots} slots left, but you tried to add {media_count}! Can you fix that, pwease?"),
            VanGogh => format!("Alas, day {day} only has {slots} slots, yet you attempted to add {media_count}. Could you adjust it?"),
            Gentleman => format!("Sir, day {day} has only {slots} slots remaining, yet {media_count} were provided. Could you adjust accordingly?"),
        },
        Line::SlotsFull { day } => match persona {
            Cute => format!("Day {day} is aww fuww up, no more woom for media! (>﹏<)"),
            VanGogh => format!("The canvas of day {day} holds no more space for new works."),
            Gentleman => format!("I'm afraid day {day} has no free media slots remaining, sir."),
        },
        Line::MismatchDaysAttachments => match persona {
            Cute => "UwU, the number of days and attachments don't match! Can you try again?".to_string(),
            VanGogh => "The number of days and attachments seem misaligned. Kindly review your input.".to_string(),
            Gentleman => "It appears there's a mismatch between days and attachments. Kindly ensure alignment.".to_string(),
        },
        Line::InvalidInput => match persona {
            Cute => "Oopsies! That input wasn't valid. Could you check and try again, pookie?".to_string(),
            VanGogh => "The input provided appears to be invalid. Could you ensure its correctness, dear friend?".to_string(),
            Gentleman => "The input appears invalid, sir. Would you kindly verify and try again?".to_string(),
        },
        Line::NoDailyJohanFound { day } => match persona {
            Cute => format!("UwU, no Daily Johan found for day {day}. Sowwy!"),
            VanGogh => format!("Alas, no Daily Johan was found for day {day}."),
            Gentleman => format!("Regrettably, no Daily Johan was found for day {day}."),
        },
        Line::ProvideDayOrLink => match persona {
            Cute => "Pwease pwovide eithew a day numbew ow a message wink! UwU".to_string(),
            VanGogh => "Dear friend, might you provide either a day number or a message link?".to_string(),
            Gentleman => "Good sir, might you kindly provide a day number or message link?".to_string(),
        },
        Line::InvalidMessageLink => match persona {
            Cute => "Hmmm... that winky wink wooks funny. Is it vawid? OwO".to_string(),
            VanGogh => "Ah, the link you shared appears unclear. Could it be incorrect?".to_string(),
            Gentleman => "It seems the link provided is invalid. Could you verify it?".to_string(),
        },
        Line::NoEntryFound => match persona {
            Cute => "｡ﾟ･ (>﹏<) ･ﾟ｡ I couwdn't find any Dewy Johan fow that input.".to_string(),
            VanGogh => "Alas, I could not find any record matching your input.".to_string(),
            Gentleman => "I regret to inform you, sir, that no record was found for your input.".to_string(),
        },
        Line::ConfirmDeletion { days } => match persona {
            Cute => format!("Ummm... awe you suwe you want to dewete the archived Daiwy Johan fow day {days}? (yes/no)"),
            VanGogh => format!("Do you truly wish to delete the archived Daily Johan for day {days}? (yes/no)"),
            Gentleman => format!("Sir, are you certain you wish to delete the archived Daily Johan for day {days}? (yes/no)"),
        },
        Line::DeletionCancelled => match persona {
            Cute => "Otay! Dewetion cancewwed, nya~!".to_string(),
            VanGogh => "Understood, dear friend. The deletion has been canceled.".to_string(),
            Gentleman => "Understood. The deletion process has been canceled, sir.".to_string(),
        },
        Line::DeletionSuccess { days } => match persona {
            Cute => format!("Goodbye! Archived Daiwy Johan fow day {days} has been deweted 。。。ミヽ(。＞＜)ノ"),
            VanGogh => format!("The archived Daily Johan for day {days} has been removed. Farewell."),
            Gentleman => format!("Archived Daily Johan for day {days} has been successfully deleted, sir."),
        },
        Line::Error { error } => match persona {
            Cute => format!("Uh oh! An ewwow occuwwed: {error}"),
            VanGogh => format!("An error occurred: {error}. My sincerest apologies."),
            Gentleman => format!("An error occurred, sir: {error}. Please accept my apologies."),
        },
        Line::DailyReminder { user, day } => match persona {
            Cute => format!("<@{user}> Dear pookie bear, you haven't done the Daily Johan for day {day} yet! UwU"),
            VanGogh => format!("<@{user}> My dear friend, you have yet to complete the Daily Johan for day {day}."),
            Gentleman => format!("<@{user}> Good sir, it appears you have yet to archive the Daily Johan for day {day}."),
        },
        Line::GapAlert { user, day, missing } => match persona {
            Cute => format!("<@{user}> Dear pookie bear, you haven't done the Daily Johan for day {day} yet! Thewe awe awso {missing} missing days in the archive >w<"),
            VanGogh => format!("<@{user}> My dear friend, day {day} awaits you. I also sense {missing} gaps in the records of the Daily Johans."),
            Gentleman => format!("<@{user}> Good sir, day {day} has yet to be archived, and the archive is missing {missing} earlier days."),
        },
        Line::VerificationPrompt { provided } => match persona {
            Cute => format!("(✿>ꇴ<) Day {provided} doesn't seem wike the next expected day... Is this intewntionaw, pookie? Pwease confiwm! (yes/no) ꒰⑅ᵕ༚ᵕ꒱˖♡"),
            VanGogh => format!("This day {provided} doesn't align with our records. Is this intentional, dear friend? Please confirm. (yes/no)"),
            Gentleman => format!("Day {provided} does not match our expected sequence. Is this intentional, sir? Please confirm. (yes/no)"),
        },
        Line::VerificationDenied => match persona {
            Cute => "Awighties~ (*´꒳`*) Wets twy again, nyan~ Couwd you confiwm if dis is a Daiwy Johan and pwovide the cowwect day numbew, pwease? (っ´ω`c)♡".to_string(),
            VanGogh | Gentleman => "Very well, could you confirm if this is a Daily Johan and provide the correct day number?".to_string(),
        },
        Line::VerificationAccepted { provided } => match persona {
            Cute => format!("Undewstood!!! \\(｡>‿‿<｡) Pwocweeding with awchiving fow day {provided}. ✨UwU✨"),
            VanGogh => format!("Understood! Proceeding with archiving for day {provided}. 🌻"),
            Gentleman => format!("Understood! Proceeding with archiving for day {provided}. 🎩"),
        },
        Line::NotArchived { msg_id } => match persona {
            Cute => format!("Otay, I won't awchive message {msg_id}. Submit it manuawwy if you change youw mind~"),
            VanGogh => format!("Very well, message {msg_id} shall remain unrecorded for now."),
            Gentleman => format!("Very good, sir. Message {msg_id} will not be archived."),
        },
        Line::NoResponse => match persona {
            Cute => "No wesponse fwom Johan... (｡•́︿•̀｡) Abowting auto-awchive.".to_string(),
            VanGogh => "The silence lingers. I shall set this archive aside.".to_string(),
            Gentleman => "No response received, sir. Aborting the archive.".to_string(),
        },
        Line::PersonaSwitched { persona } => format!("Persona switched to: {persona}"),
        Line::UnknownPersona { name } => format!(
            "Persona '{name}' not found. No changes made. Available: {}",
            Persona::ALL.map(|p| p.as_str()).join(", ")
        ),
    }
}
