use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{
    Appointment, AppointmentStatus, BookingSettings, NewAppointment, PaymentStatus,
};
use crate::db::{
    with_busy_retry, AppointmentRepository, BookingSettingsRepository, ReservationRepository,
    ServiceOfferingRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::notifications::{BookingEventKind, BookingNotification};
use crate::services::slots::overlaps;
use crate::AppState;

pub struct FinalizeService;

impl FinalizeService {
    /// Promote a still-valid hold into an appointment, exactly once.
    ///
    /// The transaction's first statement is the claiming write, so the
    /// store's writer lock serializes concurrent finalizers before anything
    /// is read. Replays (duplicate client calls, webhook retries) find the
    /// hold already used and get the linked appointment back.
    pub async fn finalize(
        state: &AppState,
        professional_id: &str,
        reservation_id: &str,
        payment_status: Option<PaymentStatus>,
    ) -> AppResult<Appointment> {
        let pool = &state.db;
        let settings = BookingSettingsRepository::get_or_create(pool, professional_id).await?;

        let (appointment, newly_created) = with_busy_retry(|| {
            Self::finalize_tx(pool, professional_id, reservation_id, payment_status, &settings)
        })
        .await?;

        if newly_created {
            let service_name = ServiceOfferingRepository::find_for_professional(
                pool,
                professional_id,
                &appointment.service_id,
            )
            .await
            .ok()
            .flatten()
            .map(|s| s.name)
            .unwrap_or_default();

            state.notifications.dispatch(BookingNotification {
                event: match appointment.status {
                    AppointmentStatus::Confirmed => BookingEventKind::AppointmentConfirmed,
                    _ => BookingEventKind::AppointmentScheduled,
                },
                professional_id: professional_id.to_string(),
                reservation_id: Some(reservation_id.to_string()),
                appointment_id: Some(appointment.id.clone()),
                confirmation_code: Some(appointment.confirmation_code.clone()),
                client_name: appointment.client_name.clone(),
                client_email: appointment.client_email.clone(),
                service_name,
                start_time: appointment.start_time,
            });
        }

        Ok(appointment)
    }

    async fn finalize_tx(
        pool: &SqlitePool,
        professional_id: &str,
        reservation_id: &str,
        payment_status: Option<PaymentStatus>,
        settings: &BookingSettings,
    ) -> AppResult<(Appointment, bool)> {
        let now = Utc::now().naive_utc();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let claimed =
            ReservationRepository::claim(&mut *tx, reservation_id, professional_id, now).await?;

        let Some(reservation) = claimed else {
            // Not claimable: missing, already finalized, or expired.
            let existing = ReservationRepository::find_by_id(&mut *tx, reservation_id)
                .await?
                .filter(|r| r.professional_id == professional_id);
            return match existing {
                None => Err(AppError::NotFound(format!(
                    "Reservation {} not found",
                    reservation_id
                ))),
                Some(r) if r.used => {
                    let appointment_id = r.appointment_id.ok_or_else(|| {
                        AppError::Internal(anyhow::anyhow!(
                            "used reservation {} has no linked appointment",
                            r.id
                        ))
                    })?;
                    let appointment = AppointmentRepository::find_by_id(&mut *tx, &appointment_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::Internal(anyhow::anyhow!(
                                "appointment {} linked by reservation {} is missing",
                                appointment_id,
                                r.id
                            ))
                        })?;
                    Ok((appointment, false))
                }
                Some(_) => Err(AppError::PreconditionFailed(
                    "Reservation expired".to_string(),
                )),
            };
        };

        // Defensive re-check: an appointment created by a different flow
        // since the hold was taken would slip past the claim. Dropping the
        // transaction rolls the claim back, so the hold stays intact for
        // manual reconciliation.
        let day_start = reservation
            .start_time
            .date()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid");
        let day_end = day_start + Duration::days(1);
        let blocking = AppointmentRepository::list_blocking_for_day(
            &mut *tx,
            professional_id,
            day_start,
            day_end,
        )
        .await?;

        let spread = settings.buffer_before_minutes + settings.buffer_after_minutes;
        let conflict_start = reservation.start_time - Duration::minutes(spread);
        let conflict_end = reservation.end_time + Duration::minutes(spread);
        if blocking
            .iter()
            .any(|a| overlaps(conflict_start, conflict_end, a.start_time, a.end_time))
        {
            tracing::error!(
                "Reservation {} conflicts with an appointment created since the hold was taken; \
                 manual reconciliation (and refund, if paid) required",
                reservation.id
            );
            return Err(AppError::SlotConflict(
                "Slot was taken by another booking".to_string(),
            ));
        }

        let effective_payment = payment_status.unwrap_or(reservation.payment_status);
        let status = if effective_payment == PaymentStatus::Approved {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Scheduled
        };

        let appointment_id = Uuid::new_v4().to_string();
        let code = confirmation_code();
        let appointment = AppointmentRepository::create(
            &mut *tx,
            &appointment_id,
            &code,
            &NewAppointment {
                professional_id: reservation.professional_id.clone(),
                service_id: reservation.service_id.clone(),
                client_name: reservation.client_name.clone(),
                client_email: reservation.client_email.clone(),
                client_phone: reservation.client_phone.clone(),
                start_time: reservation.start_time,
                end_time: reservation.end_time,
                status,
                payment_status: effective_payment,
            },
            now,
        )
        .await?;

        ReservationRepository::link_appointment(
            &mut *tx,
            &reservation.id,
            &appointment.id,
            effective_payment,
            now,
        )
        .await?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            "Reservation {} finalized into appointment {} ({:?})",
            reservation.id,
            appointment.id,
            appointment.status
        );

        Ok((appointment, true))
    }
}

fn confirmation_code() -> String {
    // Skip lookalike characters (0/O, 1/I) in codes read out to clients.
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
