use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rand::{rngs::StdRng, SeedableRng};
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::{draws, users::User};
use crate::repositories::draws::DrawRepository;
use crate::settings;

pub enum DrawRequest {
    Enter {
        user: User,
        cost: i64,
        response: oneshot::Sender<Result<(draws::Participant, i64), ServiceError>>,
    },
    GetParticipants {
        response: oneshot::Sender<Result<Vec<draws::Participant>, ServiceError>>,
    },
    Draw {
        response: oneshot::Sender<Result<draws::DrawResult, ServiceError>>,
    },
    GetNextDraw {
        response: oneshot::Sender<Result<draws::NextDraw, ServiceError>>,
    },
    GetResults {
        response: oneshot::Sender<Result<Vec<draws::DrawResult>, ServiceError>>,
    },
    Clear {
        response: oneshot::Sender<Result<u64, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct DrawRequestHandler {
    repository: DrawRepository,
    config: settings::Draw,
    offset: FixedOffset,
}

impl DrawRequestHandler {
    pub fn new(sql_conn: PgPool, config: settings::Draw, offset: FixedOffset) -> Self {
        DrawRequestHandler {
            repository: DrawRepository::new(sql_conn),
            config,
            offset,
        }
    }

    async fn enter(&self, user: User, cost: i64) -> Result<(draws::Participant, i64), ServiceError> {
        let tickets = draws::tickets_for(cost).ok_or_else(|| {
            let costs: Vec<i64> = draws::TICKET_TABLE.iter().map(|(c, _)| *c).collect();
            ServiceError::BadRequest(format!("Entry cost must be one of {:?}", costs))
        })?;
        if cost > user.balance {
            return Err(ServiceError::InsufficientBalance);
        }

        let entry = self.repository.insert_entry(&user.id, cost, tickets).await?;
        log::info!(
            "User {} entered the draw with {} tickets for {}.",
            user.id,
            tickets,
            cost
        );
        Ok(entry)
    }

    /// Draws among the entries created before `before`, or all of them.
    async fn draw(&self, before: Option<DateTime<Utc>>) -> Result<draws::DrawResult, ServiceError> {
        let mut rng = StdRng::from_entropy();
        let result = self
            .repository
            .draw(self.config.prize, before, &mut rng)
            .await?;
        log::info!(
            "Draw {} resolved among {} participants; winner {}.",
            result.id,
            result.total_participants,
            result.winning_number
        );
        Ok(result)
    }

    /// Reports the next slot, running the draw first when a slot has
    /// passed with entries still waiting for it.
    async fn get_next_draw(&self) -> Result<draws::NextDraw, ServiceError> {
        let now = Utc::now();
        let (previous, next) =
            draws::draw_slots(now, self.offset, self.config.hour, self.config.minute).ok_or_else(
                || ServiceError::Internal("Invalid draw time in configuration".to_string()),
            )?;

        let mut resolved = None;
        let last_draw = self.repository.get_last_draw_at().await?;
        if last_draw.map_or(true, |at| at < previous)
            && self.repository.has_entries_before(previous).await?
        {
            log::info!("Draw slot {} passed with entries waiting, drawing now.", previous);
            match self.draw(Some(previous)).await {
                Ok(result) => resolved = Some(result),
                // Someone else drew first.
                Err(ServiceError::BadRequest(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let (participants, tickets) = self.repository.get_counts().await?;
        Ok(draws::NextDraw {
            next_draw_at: next,
            seconds_remaining: (next - now).num_seconds().max(0),
            participants,
            tickets,
            prize: self.config.prize,
            resolved,
        })
    }
}

#[async_trait]
impl RequestHandler<DrawRequest> for DrawRequestHandler {
    async fn handle_request(&self, request: DrawRequest) {
        match request {
            DrawRequest::Enter {
                user,
                cost,
                response,
            } => {
                let _ = response.send(self.enter(user, cost).await);
            }
            DrawRequest::GetParticipants { response } => {
                let participants = self.repository.get_participants().await;
                let _ = response.send(participants.map_err(ServiceError::from));
            }
            DrawRequest::Draw { response } => {
                let _ = response.send(self.draw(None).await);
            }
            DrawRequest::GetNextDraw { response } => {
                let _ = response.send(self.get_next_draw().await);
            }
            DrawRequest::GetResults { response } => {
                let results = self.repository.get_results().await;
                let _ = response.send(results.map_err(ServiceError::from));
            }
            DrawRequest::Clear { response } => {
                let cleared = self.repository.clear().await;
                if let Ok(count) = &cleared {
                    log::info!("Cleared {} draw entries.", count);
                }
                let _ = response.send(cleared.map_err(ServiceError::from));
            }
        }
    }
}

pub struct DrawService;

impl DrawService {
    pub fn new() -> Self {
        DrawService {}
    }
}

#[async_trait]
impl Service<DrawRequest, DrawRequestHandler> for DrawService {}
