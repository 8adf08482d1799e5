mod appointment;
mod availability_exception;
mod professional;
mod reservation;
mod service_offering;
mod settings;
mod working_hours;

pub use appointment::AppointmentRepository;
pub use availability_exception::AvailabilityExceptionRepository;
pub use professional::ProfessionalRepository;
pub use reservation::ReservationRepository;
pub use service_offering::ServiceOfferingRepository;
pub use settings::BookingSettingsRepository;
pub use working_hours::WorkingHoursRepository;
