use clap::{ArgGroup, Args};
use timebank_core::{Answer, HostState};

use super::session::Session;

#[derive(Args)]
#[command(group(ArgGroup::new("result").required(true).args(["correct", "wrong"])))]
pub struct AnswerArgs {
    /// The answer was correct
    #[arg(long)]
    correct: bool,
    /// The answer was wrong
    #[arg(long)]
    wrong: bool,
    /// Seconds taken to answer
    #[arg(long, default_value = "0")]
    elapsed: f64,
    /// Question category
    #[arg(long)]
    category: Option<String>,
}

impl AnswerArgs {
    fn into_answer(self) -> Answer {
        let mut answer = if self.correct {
            Answer::correct(self.elapsed)
        } else {
            Answer::wrong(self.elapsed)
        };
        answer.category = self.category;
        answer
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub fn status() -> CmdResult {
    Session::open()?.finish()
}

pub fn credit(seconds: i64) -> CmdResult {
    let mut session = Session::open()?;
    session.economy.add_time_credits(seconds);
    session.finish()
}

pub fn answer(args: AnswerArgs) -> CmdResult {
    let mut session = Session::open()?;
    session.economy.record_answer(args.into_answer());
    session.finish()
}

pub fn background() -> CmdResult {
    let mut session = Session::open()?;
    session.set_host_state(HostState::Background)?;
    session.finish()
}

pub fn foreground() -> CmdResult {
    let mut session = Session::open()?;
    session.set_host_state(HostState::Active)?;
    session.finish()
}

pub fn penalty() -> CmdResult {
    let mut session = Session::open()?;
    session.economy.on_penalty_check();
    session.finish()
}

pub fn erase() -> CmdResult {
    let mut session = Session::open()?;
    session.economy.erase_all_progress();
    session.finish()
}
