use chrono::{Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::models::{NewReservation, PaymentStatus, Reservation};
use crate::db::{
    with_busy_retry, AppointmentRepository, BookingSettingsRepository, ProfessionalRepository,
    ReservationRepository, ServiceOfferingRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::notifications::{BookingEventKind, BookingNotification};
use crate::AppState;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReservationRequest {
    pub service_id: String,
    pub start_time: NaiveDateTime,
    #[validate(length(min = 1, message = "Client name must not be empty"))]
    pub client_name: String,
    #[validate(email(message = "Invalid client email"))]
    pub client_email: String,
    pub client_phone: Option<String>,
}

#[derive(Debug)]
pub struct ReservationOutcome {
    pub reservation: Reservation,
    /// Redirect URL for the gateway checkout, for paid services.
    pub checkout_url: Option<String>,
}

pub struct ReservationService;

impl ReservationService {
    /// Open a time-limited hold on a slot.
    ///
    /// The conflict check and the insert are one guarded statement, so two
    /// concurrent requests for overlapping slots cannot both succeed: the
    /// loser sees zero rows and gets a typed error without any visible side
    /// effect. Checkout creation and notifications happen after the hold
    /// exists and are best-effort.
    pub async fn create(
        state: &AppState,
        professional_id: &str,
        request: CreateReservationRequest,
    ) -> AppResult<ReservationOutcome> {
        let pool = &state.db;

        let professional = ProfessionalRepository::get(pool, professional_id).await?;
        let service = ServiceOfferingRepository::find_for_professional(
            pool,
            professional_id,
            &request.service_id,
        )
        .await?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::NotFound(format!("Service {} not found", request.service_id)))?;

        if service.requires_payment && state.gateway.is_none() {
            return Err(AppError::PreconditionFailed(
                "Payment gateway is not configured".to_string(),
            ));
        }

        let settings = BookingSettingsRepository::get_or_create(pool, professional_id).await?;
        let now = Utc::now().naive_utc();

        let earliest = now + Duration::hours(settings.min_notice_hours);
        if request.start_time < earliest {
            return Err(AppError::PreconditionFailed(format!(
                "Bookings require at least {} hours notice",
                settings.min_notice_hours
            )));
        }
        let latest = now + Duration::days(settings.max_notice_days);
        if request.start_time > latest {
            return Err(AppError::PreconditionFailed(format!(
                "Bookings may be placed at most {} days ahead",
                settings.max_notice_days
            )));
        }

        let start_time = request.start_time;
        let end_time = start_time + Duration::minutes(service.duration_minutes);

        // Two intervals each expanded by [-before, +after] overlap exactly
        // when the raw stored interval intersects the requested one widened
        // by (before + after) on both sides.
        let spread = settings.buffer_before_minutes + settings.buffer_after_minutes;
        let conflict_start = start_time - Duration::minutes(spread);
        let conflict_end = end_time + Duration::minutes(spread);

        let day_start = start_time
            .date()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid");
        let day_end = day_start + Duration::days(1);

        let hold = NewReservation {
            professional_id: professional_id.to_string(),
            service_id: service.id.clone(),
            start_time,
            end_time,
            client_name: request.client_name,
            client_email: request.client_email,
            client_phone: request.client_phone,
            expires_at: now + Duration::minutes(settings.reservation_hold_minutes),
            payment_status: if service.requires_payment {
                PaymentStatus::Pending
            } else {
                PaymentStatus::NotRequired
            },
        };

        let id = Uuid::new_v4().to_string();
        let inserted = with_busy_retry(|| {
            ReservationRepository::try_insert_hold(
                pool,
                &id,
                &hold,
                now,
                conflict_start,
                conflict_end,
                day_start,
                day_end,
                settings.max_appointments_per_day,
            )
        })
        .await?;

        let Some(reservation) = inserted else {
            // The guard failed; decide which precondition lost.
            let appointments =
                AppointmentRepository::count_blocking_for_day(pool, professional_id, day_start, day_end)
                    .await?;
            let reservations = ReservationRepository::count_active_for_day(
                pool,
                professional_id,
                day_start,
                day_end,
                now,
            )
            .await?;
            if appointments + reservations >= settings.max_appointments_per_day {
                return Err(AppError::DayCapReached(format!(
                    "No more bookings available on {}",
                    start_time.date()
                )));
            }
            return Err(AppError::SlotConflict(
                "Slot no longer available, please pick another".to_string(),
            ));
        };

        tracing::info!(
            "Hold {} created for professional {} at {} (expires {})",
            reservation.id,
            professional_id,
            reservation.start_time,
            reservation.expires_at
        );

        // Out-of-transaction work from here on. A checkout failure leaves
        // the hold in place; it blocks its slot until it expires.
        let mut checkout_url = None;
        if service.requires_payment {
            if let Some(gateway) = &state.gateway {
                let checkout = gateway
                    .create_checkout(&reservation, &service, &state.config.server)
                    .await?;
                ReservationRepository::set_gateway_ref(pool, &reservation.id, &checkout.id, now)
                    .await?;
                checkout_url = Some(checkout.redirect_url);
            }
        }

        state.notifications.dispatch(BookingNotification {
            event: BookingEventKind::HoldCreated,
            professional_id: professional.id,
            reservation_id: Some(reservation.id.clone()),
            appointment_id: None,
            confirmation_code: None,
            client_name: reservation.client_name.clone(),
            client_email: reservation.client_email.clone(),
            service_name: service.name.clone(),
            start_time: reservation.start_time,
        });

        Ok(ReservationOutcome {
            reservation,
            checkout_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CreateProfessional, CreateServiceOffering, UpdateBookingSettings};
    use crate::db::testing::test_pool;
    use crate::services::notifications::NotificationService;
    use std::sync::Arc;

    async fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            db: test_pool().await,
            config: crate::config::Config::default(),
            gateway: None,
            notifications: NotificationService::disabled(),
        })
    }

    async fn seed(state: &AppState) -> (String, String) {
        let professional = ProfessionalRepository::create(
            &state.db,
            CreateProfessional {
                name: "Ana".to_string(),
                email: format!("{}@example.com", Uuid::new_v4()),
            },
        )
        .await
        .unwrap();

        let service = ServiceOfferingRepository::create(
            &state.db,
            &professional.id,
            CreateServiceOffering {
                name: "Consultation".to_string(),
                duration_minutes: 60,
                price_cents: 10_000,
                currency: None,
                requires_payment: None,
            },
        )
        .await
        .unwrap();

        (professional.id, service.id)
    }

    fn free_slot() -> NaiveDateTime {
        // Two days out at noon: inside the notice window, on an empty day.
        (Utc::now().naive_utc() + Duration::days(2))
            .date()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn request(service_id: &str, start_time: NaiveDateTime) -> CreateReservationRequest {
        CreateReservationRequest {
            service_id: service_id.to_string(),
            start_time,
            client_name: "Bruno".to_string(),
            client_email: "bruno@example.com".to_string(),
            client_phone: None,
        }
    }

    #[tokio::test]
    async fn creates_a_hold_with_expiry() {
        let state = test_state().await;
        let (pro, svc) = seed(&state).await;

        let outcome = ReservationService::create(&state, &pro, request(&svc, free_slot()))
            .await
            .unwrap();

        assert!(!outcome.reservation.used);
        assert!(outcome.reservation.expires_at > Utc::now().naive_utc());
        assert_eq!(outcome.reservation.payment_status, PaymentStatus::NotRequired);
        assert!(outcome.checkout_url.is_none());
    }

    #[tokio::test]
    async fn rejects_overlap_and_leaves_no_row() {
        let state = test_state().await;
        let (pro, svc) = seed(&state).await;
        let start = free_slot();

        ReservationService::create(&state, &pro, request(&svc, start))
            .await
            .unwrap();

        // 30 minutes in: overlaps the held hour.
        let overlapping = start + Duration::minutes(30);
        let err = ReservationService::create(&state, &pro, request(&svc, overlapping))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotConflict(_)));

        let day_start = start.date().and_hms_opt(0, 0, 0).unwrap();
        let count = ReservationRepository::count_active_for_day(
            &state.db,
            &pro,
            day_start,
            day_start + Duration::days(1),
            Utc::now().naive_utc(),
        )
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn buffers_reject_adjacent_bookings() {
        let state = test_state().await;
        let (pro, svc) = seed(&state).await;
        BookingSettingsRepository::update(
            &state.db,
            &pro,
            UpdateBookingSettings {
                buffer_before_minutes: Some(15),
                buffer_after_minutes: Some(15),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let start = free_slot();
        ReservationService::create(&state, &pro, request(&svc, start))
            .await
            .unwrap();

        // Back-to-back is fine without buffers, but not with 15/15.
        let adjacent = start + Duration::minutes(60);
        let err = ReservationService::create(&state, &pro, request(&svc, adjacent))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlotConflict(_)));

        // Leaving the combined buffer gap clears it.
        let clear = start + Duration::minutes(90);
        ReservationService::create(&state, &pro, request(&svc, clear))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn enforces_minimum_notice() {
        let state = test_state().await;
        let (pro, svc) = seed(&state).await;

        // Default settings require 2 hours notice.
        let too_soon = Utc::now().naive_utc() + Duration::hours(1);
        let err = ReservationService::create(&state, &pro, request(&svc, too_soon))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn enforces_maximum_notice() {
        let state = test_state().await;
        let (pro, svc) = seed(&state).await;

        let too_far = Utc::now().naive_utc() + Duration::days(90);
        let err = ReservationService::create(&state, &pro, request(&svc, too_far))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn enforces_day_cap() {
        let state = test_state().await;
        let (pro, svc) = seed(&state).await;
        BookingSettingsRepository::update(
            &state.db,
            &pro,
            UpdateBookingSettings {
                max_appointments_per_day: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let start = free_slot();
        ReservationService::create(&state, &pro, request(&svc, start))
            .await
            .unwrap();

        // A non-overlapping slot on the same day still hits the cap.
        let later = start + Duration::hours(3);
        let err = ReservationService::create(&state, &pro, request(&svc, later))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DayCapReached(_)));
    }

    #[tokio::test]
    async fn expired_hold_releases_the_slot() {
        let state = test_state().await;
        let (pro, svc) = seed(&state).await;
        let start = free_slot();

        let outcome = ReservationService::create(&state, &pro, request(&svc, start))
            .await
            .unwrap();

        // Force the hold past its expiry.
        sqlx::query("UPDATE reservations SET expires_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc() - Duration::minutes(1))
            .bind(&outcome.reservation.id)
            .execute(&state.db)
            .await
            .unwrap();

        ReservationService::create(&state, &pro, request(&svc, start))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn paid_service_without_gateway_fails_before_insert() {
        let state = test_state().await;
        let (pro, _) = seed(&state).await;
        let paid = ServiceOfferingRepository::create(
            &state.db,
            &pro,
            CreateServiceOffering {
                name: "Paid session".to_string(),
                duration_minutes: 30,
                price_cents: 5_000,
                currency: None,
                requires_payment: Some(true),
            },
        )
        .await
        .unwrap();

        let start = free_slot();
        let err = ReservationService::create(&state, &pro, request(&paid.id, start))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));

        let day_start = start.date().and_hms_opt(0, 0, 0).unwrap();
        let count = ReservationRepository::count_active_for_day(
            &state.db,
            &pro,
            day_start,
            day_start + Duration::days(1),
            Utc::now().naive_utc(),
        )
        .await
        .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_slot_admit_exactly_one() {
        let state = test_state().await;
        let (pro, svc) = seed(&state).await;
        let start = free_slot();

        let a = {
            let state = state.clone();
            let pro = pro.clone();
            let svc = svc.clone();
            tokio::spawn(async move {
                ReservationService::create(&state, &pro, request(&svc, start)).await
            })
        };
        let b = {
            let state = state.clone();
            let pro = pro.clone();
            let svc = svc.clone();
            tokio::spawn(async move {
                ReservationService::create(&state, &pro, request(&svc, start)).await
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|&&ok| ok).count();
        assert_eq!(successes, 1, "exactly one concurrent request must win");

        let loser = if a.is_err() { a } else { b };
        assert!(matches!(loser.unwrap_err(), AppError::SlotConflict(_)));
    }
}
