use anyhow::Result;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use futures::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::Message;
use std::time::Duration;
use tracing::{error, info, warn};
use shared::*;
use serde::de::DeserializeOwned;
use crate::error::InventoryError;
use crate::inventory::{self, BookingOutcome, StatusChange};
use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

/// Applies order-lifecycle commands to the reservation table.
pub struct CommandHandler {
    pool: DbPool,
    producer: FutureProducer,
    reply_topic: String,
}

impl CommandHandler {
    pub fn new(pool: DbPool, producer: FutureProducer, reply_topic: String) -> Self {
        Self { pool, producer, reply_topic }
    }

    pub async fn run(&self, consumer: StreamConsumer) {
        let mut message_stream = consumer.stream();

        while let Some(message) = message_stream.next().await {
            match message {
                Ok(m) => {
                    if let Some(payload) = m.payload_view::<str>() {
                        match payload {
                            Ok(json_str) => match serde_json::from_str::<Command>(json_str) {
                                Ok(command) => {
                                    if let Err(e) = self.handle_command(command).await {
                                        error!("Error handling command: {}", e);
                                    }
                                }
                                Err(e) => warn!("Skipping malformed command: {}", e),
                            },
                            Err(e) => error!("Error parsing payload: {}", e),
                        }
                    }
                    if let Err(e) = consumer.commit_message(&m, rdkafka::consumer::CommitMode::Async) {
                        error!("Error committing message: {}", e);
                    }
                }
                Err(e) => error!("Error receiving message: {}", e),
            }
        }
    }

    async fn handle_command(&self, command: Command) -> Result<()> {
        let mut conn = self.pool.get().await?;

        if let Some(existing) = self.check_idempotency(&mut conn, &command.idempotency_key).await? {
            info!("Command already processed, returning cached result");
            let reply = CommandReply::success(command.id, command.order_id, existing.result);
            self.send_reply(reply).await?;
            return Ok(());
        }

        let reply = match command.command_type {
            CommandType::ReserveStock => self.handle_reserve_stock(&mut conn, &command).await?,
            CommandType::UpdateReservationStatus => self.handle_status_change(&mut conn, &command).await?,
            CommandType::ReleaseReservation => self.handle_release(&mut conn, &command).await?,
        };

        if should_cache(&reply) {
            self.store_processed_command(&mut conn, &command, &reply).await?;
        }
        self.send_reply(reply).await?;

        Ok(())
    }

    async fn handle_reserve_stock(&self, conn: &mut AsyncPgConnection, command: &Command) -> Result<CommandReply> {
        let data: ReservationData = match parse_payload(command) {
            Ok(data) => data,
            Err(reply) => return Ok(reply),
        };

        let outcome = inventory::reserve_stock(conn, data).await;
        booking_reply(command, outcome)
    }

    async fn handle_status_change(&self, conn: &mut AsyncPgConnection, command: &Command) -> Result<CommandReply> {
        let change: StatusChangeData = match parse_payload(command) {
            Ok(change) => change,
            Err(reply) => return Ok(reply),
        };

        let outcome = inventory::set_order_status(conn, change.order_id, change.status).await;
        status_reply(command, change.status, outcome)
    }

    async fn handle_release(&self, conn: &mut AsyncPgConnection, command: &Command) -> Result<CommandReply> {
        let release: ReleaseData = match parse_payload(command) {
            Ok(release) => release,
            Err(reply) => return Ok(reply),
        };

        let outcome = inventory::set_order_status(conn, release.order_id, OrderStatus::Cancelled).await;
        status_reply(command, OrderStatus::Cancelled, outcome)
    }

    async fn check_idempotency(&self, conn: &mut AsyncPgConnection, key: &str) -> Result<Option<ProcessedCommand>> {
        let result = processed_commands::table
            .filter(processed_commands::idempotency_key.eq(key))
            .first::<ProcessedCommand>(conn)
            .await
            .optional()?;
        Ok(result)
    }

    async fn store_processed_command(&self, conn: &mut AsyncPgConnection, command: &Command, reply: &CommandReply) -> Result<()> {
        let processed_command = ProcessedCommand {
            idempotency_key: command.idempotency_key.clone(),
            command_id: command.id,
            result: reply.result.clone(),
            processed_at: Some(chrono::Utc::now()),
        };

        diesel::insert_into(processed_commands::table)
            .values(&processed_command)
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn send_reply(&self, reply: CommandReply) -> Result<()> {
        let json = serde_json::to_string(&reply)?;
        let key = reply.order_id.to_string();
        let record = FutureRecord::to(&self.reply_topic)
            .payload(&json)
            .key(&key);

        self.producer.send(record, Duration::from_secs(5)).await
            .map_err(|(e, _)| anyhow::anyhow!("Failed to send reply: {}", e))?;

        Ok(())
    }
}

/// Only successful replies are cached; a rejected booking may succeed on redelivery.
fn should_cache(reply: &CommandReply) -> bool {
    reply.status == CommandStatus::Success
}

fn parse_payload<T: DeserializeOwned>(command: &Command) -> std::result::Result<T, CommandReply> {
    serde_json::from_value(command.payload.clone()).map_err(|e| {
        warn!("Malformed {:?} payload in command {}: {}", command.command_type, command.id, e);
        CommandReply::failed(command.id, command.order_id, format!("malformed payload: {}", e))
    })
}

fn booking_reply(command: &Command, outcome: std::result::Result<BookingOutcome, InventoryError>) -> Result<CommandReply> {
    let reply = match outcome {
        Ok(BookingOutcome::Reserved { reservation, .. }) | Ok(BookingOutcome::AlreadyReserved { reservation }) => {
            CommandReply::success(command.id, command.order_id, Some(serde_json::to_value(&reservation)?))
        }
        Ok(BookingOutcome::Rejected { availability }) => {
            CommandReply::failed(command.id, command.order_id, availability.message)
        }
        Err(InventoryError::InvalidInput(e)) => {
            warn!("Invalid reservation in command {}: {}", command.id, e);
            CommandReply::failed(command.id, command.order_id, e.to_string())
        }
        Err(e) => return Err(e.into()),
    };
    Ok(reply)
}

fn status_reply(
    command: &Command,
    status: OrderStatus,
    outcome: std::result::Result<StatusChange, InventoryError>,
) -> Result<CommandReply> {
    let reply = match outcome {
        Ok(StatusChange::Applied { updated }) => {
            info!("Order {} moved to {} ({} reservations)", command.order_id, status, updated);
            CommandReply::success(
                command.id,
                command.order_id,
                Some(serde_json::json!({"status": status, "updated": updated})),
            )
        }
        Ok(StatusChange::Rejected { availability }) => {
            CommandReply::failed(command.id, command.order_id, availability.message)
        }
        Err(InventoryError::InvalidInput(e)) => {
            warn!("Invalid status change in command {}: {}", command.id, e);
            CommandReply::failed(command.id, command.order_id, e.to_string())
        }
        Err(e) => return Err(e.into()),
    };
    Ok(reply)
}
