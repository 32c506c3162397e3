//! Top-level orchestration: Setup → Analyzing → Result.
//!
//! The analysis pass is all-or-nothing: critique, then voice synthesis, then
//! session population. A failure anywhere rolls the controller back to Setup
//! rather than leaving a half-populated Result. Completions are tagged with
//! the epoch of the session that issued them, so a reset mid-analysis makes
//! the eventual completion land dead instead of mutating a superseded
//! session.

use crate::critique::{CritiquePoint, SourceKind, ingest_feedbacks};
use crate::dialogue::Message;
use crate::persona::Persona;
use crate::service::{CritiqueRequest, ProfessorService};
use crate::session::{Session, SourceMaterial};
use anyhow::{Context, Result};
use futures::future::join_all;

/// Shown when the AI returns a critique with no overall comment at all.
const SILENT_PROFESSOR: &str = "The professor says nothing. The silence is not approval.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Analyzing,
    Result,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("submit at least one slide or a non-empty report before analysis")]
    EmptyMaterial,
    #[error("operation is not valid in the {0:?} phase")]
    WrongPhase(Phase),
}

/// Handed out by `begin_analysis`; carries the frozen inputs plus the epoch
/// of the session that requested the analysis.
#[derive(Debug)]
pub struct AnalysisTicket {
    epoch: u64,
    pub material: SourceMaterial,
    pub persona: Persona,
    pub system_prompt: String,
}

/// Everything a successful analysis produced, ready to become a session.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub overall_comment: String,
    pub overall_audio: String,
    pub points: Vec<CritiquePoint>,
}

#[derive(Debug, Default)]
pub struct SessionController {
    phase: Phase,
    epoch: u64,
    session: Option<Session>,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Setup
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// `Setup --> Analyzing`, gated on having material to critique. Persona
    /// and prompt are frozen into the ticket; changing persona afterwards
    /// means going back through `reset`.
    pub fn begin_analysis(
        &mut self,
        material: SourceMaterial,
        persona: Persona,
        system_prompt: String,
    ) -> Result<AnalysisTicket, ControlError> {
        if self.phase != Phase::Setup {
            return Err(ControlError::WrongPhase(self.phase));
        }
        if material.is_empty() {
            return Err(ControlError::EmptyMaterial);
        }
        self.phase = Phase::Analyzing;
        Ok(AnalysisTicket {
            epoch: self.epoch,
            material,
            persona,
            system_prompt,
        })
    }

    /// The async body of the analysis pass. Runs without borrowing the
    /// controller so a runtime may drive it from a spawned task while the
    /// controller stays responsive to `reset`.
    pub async fn run_analysis<S: ProfessorService + ?Sized>(
        service: &S,
        ticket: &AnalysisTicket,
    ) -> Result<AnalysisOutcome> {
        let kind = ticket.material.kind();
        let request = CritiqueRequest {
            system_prompt: ticket.system_prompt.clone(),
            slides: ticket.material.slides.clone(),
            transcript: ticket.material.transcript.clone(),
            report: ticket.material.report.clone(),
        };

        let reply = service
            .critique(request)
            .await
            .context("critique request failed")?;

        let overall_comment = if reply.overall_comment.trim().is_empty() {
            tracing::warn!("Critique reply carried no overall comment");
            SILENT_PROFESSOR.to_string()
        } else {
            reply.overall_comment
        };
        let mut points = ingest_feedbacks(kind, reply.feedbacks);

        let voice = ticket.persona.profile().voice;
        // The opening turn's voice is the payload of the whole pass; if it
        // cannot be synthesized the pass fails outright.
        let overall_audio = service
            .synthesize_voice(&overall_comment, voice)
            .await
            .context("voice synthesis for the overall critique failed")?;

        if kind == SourceKind::Slides && !points.is_empty() {
            // Per-point clips are an enhancement: the batch is issued
            // concurrently and awaited in full, and an individual failure
            // just leaves that point silent. Attaching by index keeps the
            // collection in the order the critique reply supplied.
            let clips = join_all(
                points
                    .iter()
                    .map(|p| service.synthesize_voice(&p.comment, voice)),
            )
            .await;
            for (point, clip) in points.iter_mut().zip(clips) {
                match clip {
                    Ok(audio) => point.attach_audio(audio),
                    Err(e) => {
                        tracing::warn!("Voice synthesis for point '{}' failed: {e:#}", point.id)
                    }
                }
            }
        }

        Ok(AnalysisOutcome {
            overall_comment,
            overall_audio,
            points,
        })
    }

    /// Applies (or discards) a finished analysis. A ticket whose epoch no
    /// longer matches belongs to a session that was reset away; its outcome
    /// is dropped without touching state. A failed outcome rolls back to
    /// Setup: there is no partial Result.
    pub fn finish_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<AnalysisOutcome>,
    ) -> Result<()> {
        if ticket.epoch != self.epoch {
            tracing::warn!("Discarding analysis outcome for a superseded session");
            return Ok(());
        }
        if self.phase != Phase::Analyzing {
            tracing::warn!("Analysis finished outside the Analyzing phase, discarding");
            return Ok(());
        }
        match outcome {
            Ok(result) => {
                let mut session = Session {
                    material: ticket.material,
                    persona: ticket.persona,
                    system_prompt: ticket.system_prompt,
                    points: result.points,
                    dialogue: Default::default(),
                };
                session
                    .dialogue
                    .seed_professor(result.overall_comment, Some(result.overall_audio));
                self.session = Some(session);
                self.phase = Phase::Result;
                Ok(())
            }
            Err(e) => {
                self.session = None;
                self.phase = Phase::Setup;
                Err(e)
            }
        }
    }

    /// Convenience path for runtimes that drive the pass inline.
    pub async fn analyze<S: ProfessorService + ?Sized>(
        &mut self,
        service: &S,
        material: SourceMaterial,
        persona: Persona,
        system_prompt: String,
    ) -> Result<()> {
        let ticket = self.begin_analysis(material, persona, system_prompt)?;
        let outcome = Self::run_analysis(service, &ticket).await;
        self.finish_analysis(ticket, outcome)
    }

    /// One rebuttal round trip: optimistic user turn, counter-critique,
    /// voice, professor turn. Counter failure rolls the dialogue back to
    /// accepting input; voice failure only costs the reply its audio.
    pub async fn rebut<S: ProfessorService + ?Sized>(
        &mut self,
        service: &S,
        text: &str,
    ) -> Result<Message> {
        if self.phase != Phase::Result {
            return Err(ControlError::WrongPhase(self.phase).into());
        }
        let session = self
            .session
            .as_mut()
            .ok_or(ControlError::WrongPhase(Phase::Setup))?;

        // History snapshot is taken first so the optimistic user turn is not
        // part of its own context.
        let history = session.dialogue.history();
        session.dialogue.submit(text)?;

        let reply = match service
            .counter(&session.system_prompt, &history, text)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                session.dialogue.fail();
                return Err(e).context("counter-critique request failed");
            }
        };

        let voice = session.persona.profile().voice;
        let audio = match service.synthesize_voice(&reply, voice).await {
            Ok(clip) => Some(clip),
            Err(e) => {
                tracing::warn!("Voice synthesis for the reply failed: {e:#}");
                None
            }
        };

        session.dialogue.resolve(reply.clone(), audio.clone());
        Ok(Message {
            role: crate::dialogue::Role::Professor,
            text: reply,
            audio,
        })
    }

    /// Destructive: discards the entire live session and returns to Setup.
    /// Bumping the epoch strands any analysis still in flight. Confirmation
    /// is the caller's responsibility.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.phase = Phase::Setup;
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critique::{CritiqueReply, RawFeedback};
    use crate::dialogue::Role;
    use crate::service::MockProfessorService;

    fn slide_material() -> SourceMaterial {
        SourceMaterial {
            slides: vec!["cGFnZTE=".into(), "cGFnZTI=".into()],
            ..Default::default()
        }
    }

    fn report_material() -> SourceMaterial {
        SourceMaterial {
            report: Some("The sample size was too small to matter.".into()),
            ..Default::default()
        }
    }

    fn two_point_reply() -> CritiqueReply {
        CritiqueReply {
            overall_comment: "Full of holes.".into(),
            feedbacks: vec![
                RawFeedback { id: "f1".into(), comment: "No baseline.".into(), slide_index: Some(0), ..Default::default() },
                RawFeedback { id: "f2".into(), comment: "Axis unlabeled.".into(), slide_index: Some(1), ..Default::default() },
            ],
        }
    }

    #[tokio::test]
    async fn analysis_populates_session_and_seeds_transcript() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(two_point_reply()) }))
            .once();
        // One clip for the overall comment, one per point.
        service
            .expect_synthesize_voice()
            .returning(|text, _| {
                let clip = format!("clip:{text}");
                Box::pin(async move { Ok(clip) })
            })
            .times(3);

        let mut controller = SessionController::new();
        controller
            .analyze(&service, slide_material(), Persona::Nitpicker, "prompt".into())
            .await
            .unwrap();

        assert_eq!(controller.phase(), Phase::Result);
        let session = controller.session().unwrap();
        assert_eq!(session.points.len(), 2);
        // Batch completion order must not disturb reply order.
        assert_eq!(session.points[0].id, "f1");
        assert_eq!(session.points[1].id, "f2");
        assert_eq!(session.points[0].audio.as_deref(), Some("clip:No baseline."));
        let messages = session.dialogue.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Professor);
        assert_eq!(messages[0].text, "Full of holes.");
        assert_eq!(messages[0].audio.as_deref(), Some("clip:Full of holes."));
    }

    #[tokio::test]
    async fn voice_failure_after_critique_rolls_back_to_setup() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(two_point_reply()) }))
            .once();
        service
            .expect_synthesize_voice()
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("tts down")) }))
            .once();

        let mut controller = SessionController::new();
        let err = controller
            .analyze(&service, slide_material(), Persona::Statistician, "prompt".into())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("voice synthesis"));

        // All-or-nothing: no partial Result.
        assert_eq!(controller.phase(), Phase::Setup);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn per_point_voice_failure_is_not_fatal() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(two_point_reply()) }));
        service
            .expect_synthesize_voice()
            .returning(|text, _| {
                let ok = text != "Axis unlabeled.";
                Box::pin(async move {
                    if ok {
                        Ok("clip".to_string())
                    } else {
                        Err(anyhow::anyhow!("tts flake"))
                    }
                })
            });

        let mut controller = SessionController::new();
        controller
            .analyze(&service, slide_material(), Persona::Theorist, "prompt".into())
            .await
            .unwrap();

        let points = &controller.session().unwrap().points;
        assert!(points[0].audio.is_some());
        assert!(points[1].audio.is_none());
    }

    #[tokio::test]
    async fn failed_analysis_leaves_the_controller_retryable() {
        let mut service = MockProfessorService::new();
        let mut flaky = true;
        service.expect_critique().returning(move |_| {
            if std::mem::take(&mut flaky) {
                Box::pin(async { Err(anyhow::anyhow!("network down")) })
            } else {
                Box::pin(async { Ok(two_point_reply()) })
            }
        });
        service
            .expect_synthesize_voice()
            .returning(|_, _| Box::pin(async { Ok("clip".to_string()) }));

        let mut controller = SessionController::new();
        assert!(
            controller
                .analyze(&service, report_material(), Persona::Nitpicker, "prompt".into())
                .await
                .is_err()
        );
        // Rolled back to Setup, so the same controller accepts a fresh pass.
        assert_eq!(controller.phase(), Phase::Setup);
        controller
            .analyze(&service, report_material(), Persona::Nitpicker, "prompt".into())
            .await
            .unwrap();
        assert_eq!(controller.phase(), Phase::Result);
    }

    #[test]
    fn empty_material_is_rejected_in_setup() {
        let mut controller = SessionController::new();
        let err = controller
            .begin_analysis(SourceMaterial::default(), Persona::Passionate, "p".into())
            .unwrap_err();
        assert_eq!(err, ControlError::EmptyMaterial);
        assert_eq!(controller.phase(), Phase::Setup);
    }

    #[tokio::test]
    async fn stale_outcome_is_discarded_after_reset() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(two_point_reply()) }));
        service
            .expect_synthesize_voice()
            .returning(|_, _| Box::pin(async { Ok("clip".to_string()) }));

        let mut controller = SessionController::new();
        let ticket = controller
            .begin_analysis(slide_material(), Persona::Nitpicker, "prompt".into())
            .unwrap();
        let outcome = SessionController::run_analysis(&service, &ticket).await;

        // The user resets while the request is "in flight".
        controller.reset();
        controller.finish_analysis(ticket, outcome).unwrap();

        assert_eq!(controller.phase(), Phase::Setup);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn empty_reply_degrades_to_fallback_comment() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(CritiqueReply::default()) }));
        service
            .expect_synthesize_voice()
            .returning(|_, _| Box::pin(async { Ok("clip".to_string()) }));

        let mut controller = SessionController::new();
        controller
            .analyze(&service, report_material(), Persona::Theorist, "prompt".into())
            .await
            .unwrap();

        let session = controller.session().unwrap();
        assert!(session.points.is_empty());
        assert_eq!(session.dialogue.messages()[0].text, SILENT_PROFESSOR);
    }

    #[tokio::test]
    async fn rebuttal_round_trip_appends_both_turns() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(two_point_reply()) }));
        service
            .expect_synthesize_voice()
            .returning(|_, _| Box::pin(async { Ok("clip".to_string()) }));
        service
            .expect_counter()
            .withf(|_, history, text| history.len() == 1 && text == "My controls were fine.")
            .returning(|_, _, _| Box::pin(async { Ok("They were not.".to_string()) }))
            .once();

        let mut controller = SessionController::new();
        controller
            .analyze(&service, report_material(), Persona::Nitpicker, "prompt".into())
            .await
            .unwrap();

        let reply = controller
            .rebut(&service, "My controls were fine.")
            .await
            .unwrap();
        assert_eq!(reply.text, "They were not.");
        assert_eq!(reply.audio.as_deref(), Some("clip"));

        let messages = controller.session().unwrap().dialogue.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].role, Role::Professor);
    }

    #[tokio::test]
    async fn counter_failure_returns_dialogue_to_idle() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(two_point_reply()) }));
        service
            .expect_synthesize_voice()
            .returning(|_, _| Box::pin(async { Ok("clip".to_string()) }));
        service
            .expect_counter()
            .returning(|_, _, _| Box::pin(async { Err(anyhow::anyhow!("network down")) }));

        let mut controller = SessionController::new();
        controller
            .analyze(&service, report_material(), Persona::Passionate, "prompt".into())
            .await
            .unwrap();

        assert!(controller.rebut(&service, "Objection!").await.is_err());
        let session = controller.session().unwrap();
        assert!(!session.dialogue.is_sending());
        // Optimistic turn stays in the transcript, unpaired.
        assert_eq!(session.dialogue.messages().len(), 2);
        assert_eq!(session.dialogue.messages()[1].role, Role::User);
    }

    #[tokio::test]
    async fn reset_discards_prior_session_wholesale() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(two_point_reply()) }));
        service
            .expect_synthesize_voice()
            .returning(|_, _| Box::pin(async { Ok("clip".to_string()) }));
        service
            .expect_counter()
            .returning(|_, _, _| Box::pin(async { Ok("Hmph.".to_string()) }));

        let mut controller = SessionController::new();
        controller
            .analyze(&service, report_material(), Persona::Nitpicker, "prompt".into())
            .await
            .unwrap();
        controller.rebut(&service, "But consider...").await.unwrap();
        assert_eq!(controller.session().unwrap().dialogue.messages().len(), 3);

        controller.reset();
        assert_eq!(controller.phase(), Phase::Setup);
        assert!(controller.session().is_none());

        controller
            .analyze(&service, slide_material(), Persona::Theorist, "prompt".into())
            .await
            .unwrap();
        // Not cumulative with the prior session: just the new opening turn.
        assert_eq!(controller.session().unwrap().dialogue.messages().len(), 1);
    }

    #[tokio::test]
    async fn rebut_outside_result_phase_is_rejected() {
        let service = MockProfessorService::new();
        let mut controller = SessionController::new();
        let err = controller.rebut(&service, "hello?").await.unwrap_err();
        assert!(err.to_string().contains("not valid"));
    }

    #[tokio::test]
    async fn blank_rebuttal_is_rejected_without_a_network_call() {
        let mut service = MockProfessorService::new();
        service
            .expect_critique()
            .returning(|_| Box::pin(async { Ok(two_point_reply()) }));
        service
            .expect_synthesize_voice()
            .returning(|_, _| Box::pin(async { Ok("clip".to_string()) }));
        // No expect_counter: a blank submission must never reach the service.

        let mut controller = SessionController::new();
        controller
            .analyze(&service, report_material(), Persona::Statistician, "prompt".into())
            .await
            .unwrap();

        assert!(controller.rebut(&service, "   ").await.is_err());
        assert_eq!(controller.session().unwrap().dialogue.messages().len(), 1);
    }
}
