//! Drives one conversation: route, let the chosen worker speak, append, repeat.

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};

use crate::agents::{Reply, Turn, Worker};
use crate::context::RunContext;
use crate::core::profile::OrchestrationProfile;
use crate::core::router::{FallbackPolicy, Route, TerminateCause, TurnRouter};
use crate::core::session::ConversationSession;
use crate::core::types::{Role, StopReason, ValidationStatus};

/// Summary of a finished conversation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session: ConversationSession,
    pub stop: StopReason,
    /// Latest verdict seen in the conversation, if any.
    pub verdict: Option<ValidationStatus>,
}

impl RunOutcome {
    pub fn is_valid(&self) -> bool {
        self.verdict.is_some_and(ValidationStatus::is_valid)
    }
}

pub struct Orchestrator<'a> {
    profile: OrchestrationProfile,
    router: TurnRouter,
    workers: Vec<Box<dyn Worker + 'a>>,
}

impl<'a> Orchestrator<'a> {
    /// Every role of `profile`'s roster must have exactly one worker.
    pub fn new(
        profile: OrchestrationProfile,
        max_rounds: u32,
        fallback: FallbackPolicy,
        workers: Vec<Box<dyn Worker + 'a>>,
    ) -> Result<Self> {
        let router = TurnRouter::for_profile(profile, max_rounds, fallback);
        for &role in router.roster() {
            let count = workers.iter().filter(|worker| worker.role() == role).count();
            if count != 1 {
                bail!("roster role {role} needs exactly one worker, found {count}");
            }
        }
        if let Some(extra) = workers
            .iter()
            .find(|worker| !router.roster().contains(&worker.role()))
        {
            bail!("worker {} is not part of the {} roster", extra.role(), profile.as_str());
        }
        Ok(Self {
            profile,
            router,
            workers,
        })
    }

    pub fn profile(&self) -> OrchestrationProfile {
        self.profile
    }

    fn worker(&self, role: Role) -> Result<&dyn Worker> {
        self.workers
            .iter()
            .find(|worker| worker.role() == role)
            .map(|worker| worker.as_ref())
            .with_context(|| format!("no worker for role {role}"))
    }

    /// Run the conversation for `task` until a worker ends it or the round
    /// budget is spent.
    ///
    /// Worker failures (decode exhaustion, transport errors) abort the run.
    pub fn run(&self, task: &str, ctx: &RunContext) -> Result<RunOutcome> {
        let _entered = ctx.span.enter();
        self.run_in_span(task, ctx)
    }

    #[instrument(skip_all, fields(profile = self.profile.as_str(), max_rounds = self.router.max_rounds()))]
    fn run_in_span(&self, task: &str, ctx: &RunContext) -> Result<RunOutcome> {
        let mut session =
            ConversationSession::new(self.router.roster().to_vec(), self.router.max_rounds(), task);
        info!("conversation started");

        let stop = loop {
            let speaker = match self.router.next(session.messages(), session.round())? {
                Route::Terminate(TerminateCause::RoundLimit) => break StopReason::RoundLimitExceeded,
                Route::Terminate(TerminateCause::Fallback) => break StopReason::FallbackTerminated,
                Route::Speaker(role) => role,
            };
            debug!(round = session.round(), speaker = %speaker, "next speaker");

            let turn = Turn {
                history: session.messages(),
                round: session.round(),
                ctx,
            };
            let reply = self
                .worker(speaker)?
                .respond(&turn)
                .with_context(|| format!("{speaker} turn in round {}", session.round()))?;
            match reply {
                Reply::EndConversation => break StopReason::Completed,
                Reply::Message(message) => {
                    if message.speaker != speaker {
                        bail!("{speaker} produced a message attributed to {}", message.speaker);
                    }
                    session.append(message)?;
                }
            }
            session.advance_round();
        };
        session.terminate();

        let verdict = session.last_verdict();
        info!(
            stop = stop.as_str(),
            rounds = session.round(),
            verdict = verdict.map(ValidationStatus::as_str),
            "conversation finished"
        );
        Ok(RunOutcome {
            session,
            stop,
            verdict,
        })
    }
}
