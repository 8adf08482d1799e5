use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::db::models::{
    Appointment, AvailabilityException, BookingSettings, ExceptionKind, Reservation, WorkingDay,
};
use crate::db::{
    AppointmentRepository, AvailabilityExceptionRepository, BookingSettingsRepository,
    ProfessionalRepository, ReservationRepository, ServiceOfferingRepository,
    WorkingHoursRepository,
};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Fixed step between candidate slot start times.
pub const SLOT_GRANULARITY_MINUTES: i64 = 15;

/// Everything the generator needs for one (professional, service, date)
/// query. Assembled from the store by `SlotService::available_slots`; the
/// generation itself is pure and free of side effects.
#[derive(Debug, Clone)]
pub struct SlotContext {
    pub date: NaiveDate,
    pub duration_minutes: i64,
    pub now: NaiveDateTime,
    pub working_day: Option<WorkingDay>,
    pub exceptions: Vec<AvailabilityException>,
    pub appointments: Vec<Appointment>,
    pub reservations: Vec<Reservation>,
    pub settings: BookingSettings,
}

/// Compute the ordered, deduplicated candidate start times for one day.
///
/// A candidate survives when its buffer-expanded interval clears every
/// buffer-expanded booking and hold, it fits inside its base window, and it
/// respects the notice window. The day cap counts confirmed bookings and
/// pending holds alike and takes precedence over any free time.
pub fn generate_slots(ctx: &SlotContext) -> Vec<NaiveDateTime> {
    let settings = &ctx.settings;
    let earliest = ctx.now + Duration::hours(settings.min_notice_hours);
    let latest = ctx.now + Duration::days(settings.max_notice_days);

    if ctx.date < earliest.date() || ctx.date > latest.date() {
        return Vec::new();
    }

    let blocking_appointments: Vec<&Appointment> = ctx
        .appointments
        .iter()
        .filter(|a| a.status.blocks_slot())
        .collect();
    let active_reservations: Vec<&Reservation> = ctx
        .reservations
        .iter()
        .filter(|r| !r.used && r.expires_at > ctx.now)
        .collect();

    let day_count = blocking_appointments.len() + active_reservations.len();
    if day_count as i64 >= settings.max_appointments_per_day {
        return Vec::new();
    }

    // Busy intervals, each expanded by the buffers. Blocked exceptions are
    // taken verbatim.
    let before = settings.buffer_before_minutes;
    let after = settings.buffer_after_minutes;
    let mut busy: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::new();
    for appointment in &blocking_appointments {
        busy.push(expand(
            appointment.start_time,
            appointment.end_time,
            before,
            after,
        ));
    }
    for reservation in &active_reservations {
        busy.push(expand(
            reservation.start_time,
            reservation.end_time,
            before,
            after,
        ));
    }
    for exception in &ctx.exceptions {
        if exception.kind == ExceptionKind::Blocked {
            busy.push((
                ctx.date.and_time(exception.start_time),
                ctx.date.and_time(exception.end_time),
            ));
        }
    }

    // Base bookable windows: enabled weekly hours plus extra exceptions,
    // processed independently. Overlapping windows may yield the same
    // candidate twice; the final dedup takes care of it.
    let mut base: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::new();
    if let Some(day) = &ctx.working_day {
        if day.enabled {
            for window in &day.windows {
                base.push((ctx.date.and_time(window.start), ctx.date.and_time(window.end)));
            }
        }
    }
    for exception in &ctx.exceptions {
        if exception.kind == ExceptionKind::Extra {
            base.push((
                ctx.date.and_time(exception.start_time),
                ctx.date.and_time(exception.end_time),
            ));
        }
    }

    let duration = Duration::minutes(ctx.duration_minutes);
    let mut slots: Vec<NaiveDateTime> = Vec::new();
    for (window_start, window_end) in base {
        let mut slot = round_up_to_granularity(window_start);
        while slot + duration <= window_end {
            let (candidate_start, candidate_end) = expand(slot, slot + duration, before, after);
            let clear = busy
                .iter()
                .all(|&(busy_start, busy_end)| {
                    !overlaps(candidate_start, candidate_end, busy_start, busy_end)
                });
            if clear && slot >= earliest {
                slots.push(slot);
            }
            slot += Duration::minutes(SLOT_GRANULARITY_MINUTES);
        }
    }

    slots.sort();
    slots.dedup();
    slots
}

/// Half-open interval overlap: [a_start, a_end) and [b_start, b_end).
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

fn expand(
    start: NaiveDateTime,
    end: NaiveDateTime,
    before_minutes: i64,
    after_minutes: i64,
) -> (NaiveDateTime, NaiveDateTime) {
    (
        start - Duration::minutes(before_minutes),
        end + Duration::minutes(after_minutes),
    )
}

fn round_up_to_granularity(dt: NaiveDateTime) -> NaiveDateTime {
    let step = SLOT_GRANULARITY_MINUTES * 60;
    let seconds = dt.time().num_seconds_from_midnight() as i64;
    let rounded = (seconds + step - 1) / step * step;
    dt.date().and_hms_opt(0, 0, 0).expect("midnight is valid") + Duration::seconds(rounded)
}

pub struct SlotService;

impl SlotService {
    /// Load everything the generator needs and run it. Read-only; safe to
    /// call concurrently with reservation and finalize traffic.
    pub async fn available_slots(
        state: &AppState,
        professional_id: &str,
        service_id: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<NaiveDateTime>> {
        let pool = &state.db;

        ProfessionalRepository::get(pool, professional_id).await?;
        let service = ServiceOfferingRepository::find_for_professional(pool, professional_id, service_id)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| AppError::NotFound(format!("Service {} not found", service_id)))?;

        let settings = BookingSettingsRepository::get_or_create(pool, professional_id).await?;
        let weekday = WorkingDay::for_weekday(date.weekday());
        let working_day = WorkingHoursRepository::get_day(pool, professional_id, weekday).await?;
        let exceptions =
            AvailabilityExceptionRepository::list_for_date(pool, professional_id, date).await?;

        let now = chrono::Utc::now().naive_utc();
        let day_start = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let day_end = day_start + Duration::days(1);
        let appointments =
            AppointmentRepository::list_blocking_for_day(pool, professional_id, day_start, day_end)
                .await?;
        let reservations = ReservationRepository::list_active_for_day(
            pool,
            professional_id,
            day_start,
            day_end,
            now,
        )
        .await?;

        Ok(generate_slots(&SlotContext {
            date,
            duration_minutes: service.duration_minutes,
            now,
            working_day,
            exceptions,
            appointments,
            reservations,
            settings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AppointmentStatus, PaymentStatus, TimeWindow};
    use chrono::{NaiveTime, Weekday};

    fn settings(professional_id: &str) -> BookingSettings {
        let now = date(2025, 6, 1).and_hms_opt(0, 0, 0).unwrap();
        BookingSettings {
            professional_id: professional_id.to_string(),
            buffer_before_minutes: 0,
            buffer_after_minutes: 0,
            min_notice_hours: 2,
            max_notice_days: 60,
            max_appointments_per_day: 8,
            reservation_hold_minutes: 30,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn working_monday(windows: &[(u32, u32, u32, u32)]) -> WorkingDay {
        WorkingDay {
            weekday: WorkingDay::for_weekday(Weekday::Mon),
            enabled: true,
            windows: windows
                .iter()
                .map(|&(sh, sm, eh, em)| TimeWindow {
                    start: time(sh, sm),
                    end: time(eh, em),
                })
                .collect(),
        }
    }

    fn appointment(day: NaiveDate, start: NaiveTime, end: NaiveTime) -> Appointment {
        let now = day.and_hms_opt(0, 0, 0).unwrap();
        Appointment {
            id: "apt-1".to_string(),
            professional_id: "pro-1".to_string(),
            service_id: "svc-1".to_string(),
            client_name: "Client".to_string(),
            client_email: "client@example.com".to_string(),
            client_phone: None,
            start_time: day.and_time(start),
            end_time: day.and_time(end),
            status: AppointmentStatus::Scheduled,
            payment_status: PaymentStatus::NotRequired,
            confirmation_code: "ABC123".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn reservation(
        day: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        expires_at: NaiveDateTime,
    ) -> Reservation {
        let now = day.and_hms_opt(0, 0, 0).unwrap();
        Reservation {
            id: "res-1".to_string(),
            professional_id: "pro-1".to_string(),
            service_id: "svc-1".to_string(),
            start_time: day.and_time(start),
            end_time: day.and_time(end),
            client_name: "Client".to_string(),
            client_email: "client@example.com".to_string(),
            client_phone: None,
            expires_at,
            used: false,
            payment_status: PaymentStatus::Pending,
            gateway_ref: None,
            appointment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn base_ctx() -> SlotContext {
        // 2025-06-02 is a Monday; "now" is the afternoon before, so the
        // notice window never interferes unless a test moves it.
        SlotContext {
            date: date(2025, 6, 2),
            duration_minutes: 60,
            now: date(2025, 6, 1).and_hms_opt(12, 0, 0).unwrap(),
            working_day: Some(working_monday(&[(9, 0, 12, 0)])),
            exceptions: vec![],
            appointments: vec![],
            reservations: vec![],
            settings: settings("pro-1"),
        }
    }

    fn times(slots: &[NaiveDateTime]) -> Vec<String> {
        slots.iter().map(|s| s.format("%H:%M").to_string()).collect()
    }

    #[test]
    fn worked_example_monday_morning() {
        let ctx = base_ctx();
        let slots = generate_slots(&ctx);
        assert_eq!(
            times(&slots),
            vec![
                "09:00", "09:15", "09:30", "09:45", "10:00", "10:15", "10:30", "10:45", "11:00"
            ]
        );
    }

    #[test]
    fn notice_window_shifts_earliest_slot() {
        let mut ctx = base_ctx();
        // min_notice_hours = 2 and now = 10:00 on the target day: the
        // earliest offered slot must be at or after 12:00.
        ctx.now = ctx.date.and_hms_opt(10, 0, 0).unwrap();
        ctx.working_day = Some(working_monday(&[(9, 0, 17, 0)]));
        let slots = generate_slots(&ctx);
        assert_eq!(slots.first().map(|s| s.time()), Some(time(12, 0)));
        assert!(slots.iter().all(|s| s.time() >= time(12, 0)));
    }

    #[test]
    fn date_outside_notice_window_rejected() {
        let mut ctx = base_ctx();
        ctx.settings.max_notice_days = 30;
        ctx.now = date(2025, 4, 1).and_hms_opt(12, 0, 0).unwrap();
        assert!(generate_slots(&ctx).is_empty());

        ctx.now = date(2025, 6, 3).and_hms_opt(12, 0, 0).unwrap();
        assert!(generate_slots(&ctx).is_empty());
    }

    #[test]
    fn day_cap_wins_over_free_time() {
        let mut ctx = base_ctx();
        ctx.settings.max_appointments_per_day = 1;
        ctx.appointments = vec![appointment(ctx.date, time(9, 0), time(10, 0))];
        assert!(generate_slots(&ctx).is_empty());
    }

    #[test]
    fn active_hold_counts_toward_day_cap() {
        let mut ctx = base_ctx();
        ctx.settings.max_appointments_per_day = 1;
        let expires = ctx.now + Duration::minutes(30);
        ctx.reservations = vec![reservation(ctx.date, time(9, 0), time(10, 0), expires)];
        assert!(generate_slots(&ctx).is_empty());
    }

    #[test]
    fn appointment_blocks_overlapping_candidates() {
        let mut ctx = base_ctx();
        ctx.working_day = Some(working_monday(&[(9, 0, 13, 0)]));
        ctx.appointments = vec![appointment(ctx.date, time(10, 0), time(11, 0))];
        let slots = generate_slots(&ctx);
        // 60-minute service: anything starting in (09:00, 11:00) collides.
        assert_eq!(times(&slots), vec!["09:00", "11:00", "11:15", "11:30", "11:45", "12:00"]);
    }

    #[test]
    fn buffers_widen_the_blocked_window() {
        let mut ctx = base_ctx();
        ctx.settings.buffer_before_minutes = 15;
        ctx.settings.buffer_after_minutes = 15;
        ctx.working_day = Some(working_monday(&[(8, 0, 17, 0)]));
        ctx.appointments = vec![appointment(ctx.date, time(10, 0), time(11, 0))];
        let slots = generate_slots(&ctx);
        let slot_times = times(&slots);
        // Candidate 08:30 expands to [08:15, 09:45] and just clears the
        // appointment's [09:45, 11:15]; 08:45 does not.
        assert!(slot_times.contains(&"08:30".to_string()));
        assert!(!slot_times.contains(&"08:45".to_string()));
        assert!(!slot_times.contains(&"11:15".to_string()));
        assert!(slot_times.contains(&"11:30".to_string()));
    }

    #[test]
    fn expired_hold_releases_its_slot() {
        let mut ctx = base_ctx();
        let expired = ctx.now - Duration::minutes(1);
        ctx.reservations = vec![reservation(ctx.date, time(9, 0), time(10, 0), expired)];
        let slots = generate_slots(&ctx);
        assert!(times(&slots).contains(&"09:00".to_string()));
    }

    #[test]
    fn active_hold_blocks_its_slot() {
        let mut ctx = base_ctx();
        let expires = ctx.now + Duration::minutes(30);
        ctx.reservations = vec![reservation(ctx.date, time(9, 0), time(10, 0), expires)];
        let slots = generate_slots(&ctx);
        assert!(!times(&slots).contains(&"09:00".to_string()));
        assert!(times(&slots).contains(&"10:00".to_string()));
    }

    #[test]
    fn canceled_appointment_does_not_block() {
        let mut ctx = base_ctx();
        let mut canceled = appointment(ctx.date, time(9, 0), time(10, 0));
        canceled.status = AppointmentStatus::Canceled;
        ctx.appointments = vec![canceled];
        let slots = generate_slots(&ctx);
        assert!(times(&slots).contains(&"09:00".to_string()));
    }

    #[test]
    fn blocked_exception_removes_interval_without_buffers() {
        let mut ctx = base_ctx();
        ctx.settings.buffer_before_minutes = 30;
        ctx.settings.buffer_after_minutes = 30;
        ctx.working_day = Some(working_monday(&[(8, 0, 17, 0)]));
        ctx.exceptions = vec![AvailabilityException {
            id: "exc-1".to_string(),
            professional_id: "pro-1".to_string(),
            date: ctx.date,
            start_time: time(10, 0),
            end_time: time(11, 0),
            kind: ExceptionKind::Blocked,
            created_at: ctx.now,
        }];
        let slots = generate_slots(&ctx);
        let slot_times = times(&slots);
        // The exception itself is not buffer-expanded, but candidates are:
        // 08:30 expands to [08:00, 10:00] and clears the block.
        assert!(slot_times.contains(&"08:30".to_string()));
        assert!(!slot_times.contains(&"09:45".to_string()));
    }

    #[test]
    fn extra_exception_adds_slots_on_disabled_day() {
        let mut ctx = base_ctx();
        ctx.working_day = Some(WorkingDay {
            weekday: WorkingDay::for_weekday(Weekday::Mon),
            enabled: false,
            windows: vec![TimeWindow {
                start: time(9, 0),
                end: time(12, 0),
            }],
        });
        ctx.exceptions = vec![AvailabilityException {
            id: "exc-1".to_string(),
            professional_id: "pro-1".to_string(),
            date: ctx.date,
            start_time: time(14, 0),
            end_time: time(16, 0),
            kind: ExceptionKind::Extra,
            created_at: ctx.now,
        }];
        let slots = generate_slots(&ctx);
        assert_eq!(times(&slots), vec!["14:00", "14:15", "14:30", "14:45", "15:00"]);
    }

    #[test]
    fn overlapping_base_windows_deduplicate() {
        let mut ctx = base_ctx();
        ctx.exceptions = vec![AvailabilityException {
            id: "exc-1".to_string(),
            professional_id: "pro-1".to_string(),
            date: ctx.date,
            start_time: time(10, 0),
            end_time: time(13, 0),
            kind: ExceptionKind::Extra,
            created_at: ctx.now,
        }];
        let slots = generate_slots(&ctx);
        let mut deduped = slots.clone();
        deduped.dedup();
        assert_eq!(slots, deduped);
        assert_eq!(
            times(&slots),
            vec![
                "09:00", "09:15", "09:30", "09:45", "10:00", "10:15", "10:30", "10:45", "11:00",
                "11:15", "11:30", "11:45", "12:00"
            ]
        );
    }

    #[tokio::test]
    async fn expired_hold_frees_the_slot_end_to_end() {
        use crate::db::models::{CreateProfessional, CreateServiceOffering};
        use crate::db::testing::test_pool;
        use crate::services::notifications::NotificationService;
        use crate::services::reservations::{CreateReservationRequest, ReservationService};
        use chrono::Utc;
        use std::sync::Arc;

        let state = Arc::new(AppState {
            db: test_pool().await,
            config: crate::config::Config::default(),
            gateway: None,
            notifications: NotificationService::disabled(),
        });

        let professional = ProfessionalRepository::create(
            &state.db,
            CreateProfessional {
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
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

        // Work every day 09:00-17:00 so the target date is bookable.
        let week: Vec<WorkingDay> = (0..7)
            .map(|weekday| WorkingDay {
                weekday,
                enabled: true,
                windows: vec![TimeWindow {
                    start: time(9, 0),
                    end: time(17, 0),
                }],
            })
            .collect();
        WorkingHoursRepository::replace_week(&state.db, &professional.id, &week)
            .await
            .unwrap();

        let target_date = (Utc::now().naive_utc() + Duration::days(3)).date();
        let start = target_date.and_hms_opt(12, 0, 0).unwrap();

        let before =
            SlotService::available_slots(&state, &professional.id, &service.id, target_date)
                .await
                .unwrap();
        assert!(before.contains(&start));

        let outcome = ReservationService::create(
            &state,
            &professional.id,
            CreateReservationRequest {
                service_id: service.id.clone(),
                start_time: start,
                client_name: "Bruno".to_string(),
                client_email: "bruno@example.com".to_string(),
                client_phone: None,
            },
        )
        .await
        .unwrap();

        let held =
            SlotService::available_slots(&state, &professional.id, &service.id, target_date)
                .await
                .unwrap();
        assert!(!held.contains(&start));

        sqlx::query("UPDATE reservations SET expires_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc() - Duration::minutes(1))
            .bind(&outcome.reservation.id)
            .execute(&state.db)
            .await
            .unwrap();

        let released =
            SlotService::available_slots(&state, &professional.id, &service.id, target_date)
                .await
                .unwrap();
        assert!(released.contains(&start));
    }

    #[test]
    fn window_start_rounds_up_to_granularity() {
        let mut ctx = base_ctx();
        ctx.working_day = Some(WorkingDay {
            weekday: WorkingDay::for_weekday(Weekday::Mon),
            enabled: true,
            windows: vec![TimeWindow {
                start: time(9, 5),
                end: time(11, 0),
            }],
        });
        let slots = generate_slots(&ctx);
        assert_eq!(times(&slots), vec!["09:15", "09:30", "09:45", "10:00"]);
    }
}
