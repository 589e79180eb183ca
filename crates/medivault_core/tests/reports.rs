mod support;

use medivault_core::db::open_db_in_memory;
use medivault_core::db::schema::APPLICATION_TABLES;
use medivault_core::{
    AppointmentService, BookAppointmentRequest, ReportService, Role, ServiceError,
};
use support::{create_user, FUTURE_MS};

fn generated_at() -> i64 {
    42
}

#[test]
fn summary_zero_fills_every_role_and_status() {
    let conn = open_db_in_memory().unwrap();
    let (_, admin) = create_user(&conn, Role::Admin, "admin@example.com");
    let service = ReportService::from_connection(&conn)
        .unwrap()
        .with_clock(generated_at);

    let summary = service.summary(&admin).unwrap();
    assert_eq!(summary.generated_at, 42);
    assert_eq!(summary.active_users_by_role.len(), 5);
    assert_eq!(summary.active_users_by_role["admin"], 1);
    assert_eq!(summary.active_users_by_role["lab_technician"], 0);
    assert_eq!(summary.appointments_by_status.len(), 5);
    assert_eq!(summary.appointments_by_status["cancel_requested"], 0);
    assert_eq!(summary.prescriptions_by_status.len(), 3);
    assert_eq!(summary.lab_tests_by_status.len(), 4);
    assert_eq!(summary.unread_notifications, 0);
}

#[test]
fn summary_counts_activity() {
    let conn = open_db_in_memory().unwrap();
    let (_, admin) = create_user(&conn, Role::Admin, "admin@example.com");
    let (doctor, _) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (_, patient) = create_user(&conn, Role::Patient, "pat@example.com");
    AppointmentService::from_connection(&conn)
        .unwrap()
        .book(
            &patient,
            BookAppointmentRequest {
                patient_id: None,
                doctor_id: doctor.id,
                scheduled_at: FUTURE_MS,
                reason: "cough".to_string(),
                notes: None,
            },
        )
        .unwrap();

    let summary = ReportService::from_connection(&conn)
        .unwrap()
        .summary(&admin)
        .unwrap();
    assert_eq!(summary.active_users_by_role["doctor"], 1);
    assert_eq!(summary.active_users_by_role["patient"], 1);
    assert_eq!(summary.appointments_by_status["pending"], 1);
    assert_eq!(summary.unread_notifications, 1);
}

#[test]
fn reports_are_admin_only() {
    let conn = open_db_in_memory().unwrap();
    let (_, doctor) = create_user(&conn, Role::Doctor, "doc@example.com");
    let service = ReportService::from_connection(&conn).unwrap();

    assert!(matches!(
        service.summary(&doctor).unwrap_err(),
        ServiceError::Forbidden(_)
    ));
    assert!(matches!(
        service.schema(&doctor).unwrap_err(),
        ServiceError::Forbidden(_)
    ));
}

#[test]
fn schema_describes_every_application_table() {
    let conn = open_db_in_memory().unwrap();
    let (_, admin) = create_user(&conn, Role::Admin, "admin@example.com");
    let tables = ReportService::from_connection(&conn)
        .unwrap()
        .schema(&admin)
        .unwrap();

    let names: Vec<&str> = tables.iter().map(|table| table.table.as_str()).collect();
    assert_eq!(names, APPLICATION_TABLES.to_vec());
    let sessions = tables.iter().find(|table| table.table == "sessions").unwrap();
    assert!(sessions.columns.iter().any(|column| column.name == "expires_at"));
}
