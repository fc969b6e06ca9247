//! Command-line arguments

use std::path::PathBuf;

use campus::AnswerFile;
use clap::{Parser, Subcommand};

/// Campus API client
#[derive(Parser, Debug)]
#[command(name = "campus-cli", version, about = "Command-line client for the campus API")]
pub struct Cli {
    /// Config file (defaults to CONFIG_PATH, then ./campus-cli.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Sign in and store the session
    Login { username: String, password: String },
    /// Show the signed-in profile
    Me,
    /// Forget the stored session
    Logout,
    /// List assignments
    Assignments {
        /// Only assignments still open for submission
        #[arg(long)]
        open: bool,
    },
    /// List your scores
    Scores,
    /// Per-course overview
    Courses,
    /// Hand in answers and attachments
    Submit {
        /// Assignment id
        assignment_id: String,
        /// Answers as a JSON value, e.g. '{"q1":"B"}'
        #[arg(value_name = "ANSWERS_JSON", value_parser = parse_answers)]
        answers: serde_json::Value,
        /// Attachments, one per question
        #[arg(value_name = "QUESTION=PATH", value_parser = parse_attachment)]
        files: Vec<AnswerFile>,
    },
    /// Ask the study assistant
    Ask {
        question: String,
        /// Images uploaded before the question is sent
        #[arg(value_name = "IMAGE")]
        images: Vec<PathBuf>,
    },
    /// Print this install's device id
    DeviceId,
}

fn parse_answers(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("answers must be JSON: {e}"))
}

fn parse_attachment(raw: &str) -> Result<AnswerFile, String> {
    match raw.split_once('=') {
        Some((question, path)) if !question.is_empty() && !path.is_empty() => {
            Ok(AnswerFile::new(question, path))
        }
        _ => Err(format!("expected QUESTION=PATH, got {raw:?}")),
    }
}
