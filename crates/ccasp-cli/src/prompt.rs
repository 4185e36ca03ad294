use ccasp_core::decision::{Assessment, Choice, ChoiceProvider};
use ccasp_core::detect::{CustomizedReason, Detection};
use std::io::{BufRead, Write};

/// Asks about each conflict on stderr and reads the answer from `input`.
/// End of input or a read error counts as "skip".
pub struct LinePrompt<R> {
    input: R,
}

impl<R: BufRead> LinePrompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

fn describe(conflict: &Assessment) -> String {
    let why = match &conflict.detection {
        Detection::Customized {
            reason: CustomizedReason::Drift,
        } => "edited since it was deployed",
        Detection::Customized {
            reason: CustomizedReason::NoBaseline,
        } => "not deployed by ccasp",
        Detection::Customized {
            reason: CustomizedReason::Flagged,
        } => "marked as customized",
        _ => "differs from the template",
    };
    match &conflict.significance {
        Some(s) => format!(
            "{} is {why}; template change is {} ({})",
            conflict.asset, s.level, s.summary
        ),
        None => format!("{} is {why}", conflict.asset),
    }
}

pub fn parse_choice(answer: &str) -> Option<Choice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "s" | "skip" => Some(Choice::Skip),
        "b" | "backup" => Some(Choice::BackupAndReplace),
        "o" | "overwrite" => Some(Choice::Overwrite),
        _ => None,
    }
}

impl<R: BufRead> ChoiceProvider for LinePrompt<R> {
    fn choose(&mut self, conflict: &Assessment) -> Choice {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "{}", describe(conflict));
        loop {
            let _ = write!(stderr, "  [s]kip / [b]ackup+replace / [o]verwrite? ");
            let _ = stderr.flush();

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return Choice::Skip,
                Ok(_) => {
                    if let Some(choice) = parse_choice(&line) {
                        return choice;
                    }
                }
            }
        }
    }
}
