mod support;

use medivault_core::db::open_db_in_memory;
use medivault_core::{
    LabTestService, LabTestStatus, OrderLabTestRequest, PageRequest, Role, ServiceError, UserId,
};
use support::{create_user, unread};

fn order(patient_id: UserId) -> OrderLabTestRequest {
    OrderLabTestRequest {
        patient_id,
        test_name: "Complete blood count".to_string(),
        notes: None,
    }
}

#[test]
fn order_alerts_every_active_technician() {
    let conn = open_db_in_memory().unwrap();
    let (doctor, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (patient, _) = create_user(&conn, Role::Patient, "pat@example.com");
    let (_, tech_one) = create_user(&conn, Role::LabTechnician, "lab1@example.com");
    let (_, tech_two) = create_user(&conn, Role::LabTechnician, "lab2@example.com");
    let service = LabTestService::from_connection(&conn).unwrap();

    let test = service.order(&doctor_p, order(patient.id)).unwrap();
    assert_eq!(test.status, LabTestStatus::Ordered);
    assert_eq!(test.doctor_id, doctor.id);
    assert!(test.technician_id.is_none());

    assert_eq!(unread(&conn, &tech_one), 1);
    assert_eq!(unread(&conn, &tech_two), 1);
}

#[test]
fn only_doctors_order_and_only_for_patients() {
    let conn = open_db_in_memory().unwrap();
    let (doctor, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let service = LabTestService::from_connection(&conn).unwrap();

    assert!(matches!(
        service.order(&patient_p, order(patient.id)).unwrap_err(),
        ServiceError::Forbidden(_)
    ));
    assert_eq!(
        service.order(&doctor_p, order(doctor.id)).unwrap_err().code(),
        "validation_error"
    );

    let mut blank = order(patient.id);
    blank.test_name = "  ".to_string();
    assert_eq!(
        service.order(&doctor_p, blank).unwrap_err().code(),
        "validation_error"
    );
}

#[test]
fn assigned_technician_records_result() {
    let conn = open_db_in_memory().unwrap();
    let (_, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let (tech, tech_p) = create_user(&conn, Role::LabTechnician, "lab1@example.com");
    let (_, other_tech) = create_user(&conn, Role::LabTechnician, "lab2@example.com");
    let service = LabTestService::from_connection(&conn).unwrap();
    let test = service.order(&doctor_p, order(patient.id)).unwrap();

    let early = service.record_result(&tech_p, test.id, "normal").unwrap_err();
    assert!(matches!(early, ServiceError::Forbidden(_)));

    let started = service.start(&tech_p, test.id).unwrap();
    assert_eq!(started.status, LabTestStatus::InProgress);
    assert_eq!(started.technician_id, Some(tech.id));

    let restart = service.start(&other_tech, test.id).unwrap_err();
    assert!(matches!(restart, ServiceError::InvalidTransition { .. }));

    let stolen = service.record_result(&other_tech, test.id, "normal").unwrap_err();
    assert!(matches!(stolen, ServiceError::Forbidden(_)));

    let empty = service.record_result(&tech_p, test.id, "   ").unwrap_err();
    assert_eq!(empty.code(), "validation_error");

    let completed = service
        .record_result(&tech_p, test.id, " Hemoglobin 14 g/dL ")
        .unwrap();
    assert_eq!(completed.status, LabTestStatus::Completed);
    assert_eq!(completed.result.as_deref(), Some("Hemoglobin 14 g/dL"));
    assert!(completed.completed_at.is_some());
    assert_eq!(unread(&conn, &patient_p), 1);
    assert_eq!(unread(&conn, &doctor_p), 1);
}

#[test]
fn cancel_by_ordering_doctor_until_completed() {
    let conn = open_db_in_memory().unwrap();
    let (_, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let (_, tech_p) = create_user(&conn, Role::LabTechnician, "lab@example.com");
    let (_, admin) = create_user(&conn, Role::Admin, "admin@example.com");
    let service = LabTestService::from_connection(&conn).unwrap();

    let in_progress = service.order(&doctor_p, order(patient.id)).unwrap();
    service.start(&tech_p, in_progress.id).unwrap();
    let cancelled = service.cancel(&doctor_p, in_progress.id).unwrap();
    assert_eq!(cancelled.status, LabTestStatus::Cancelled);
    assert_eq!(unread(&conn, &patient_p), 1);

    let done = service.order(&doctor_p, order(patient.id)).unwrap();
    service.start(&tech_p, done.id).unwrap();
    service.record_result(&tech_p, done.id, "negative").unwrap();
    let err = service.cancel(&admin, done.id).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition { .. }));

    assert!(matches!(
        service.cancel(&tech_p, done.id).unwrap_err(),
        ServiceError::Forbidden(_)
    ));
}

#[test]
fn listing_is_scoped_by_role() {
    let conn = open_db_in_memory().unwrap();
    let (_, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (_, other_doctor) = create_user(&conn, Role::Doctor, "doc2@example.com");
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let (_, tech_p) = create_user(&conn, Role::LabTechnician, "lab@example.com");
    let (_, pharmacist) = create_user(&conn, Role::Pharmacist, "rx@example.com");
    let service = LabTestService::from_connection(&conn).unwrap();

    let first = service.order(&doctor_p, order(patient.id)).unwrap();
    service.order(&doctor_p, order(patient.id)).unwrap();
    service.start(&tech_p, first.id).unwrap();

    let page = PageRequest::default();
    assert_eq!(service.list(&patient_p, None, page).unwrap().items.len(), 2);
    assert_eq!(service.list(&other_doctor, None, page).unwrap().items.len(), 0);
    assert_eq!(
        service
            .list(&tech_p, Some(LabTestStatus::Ordered), page)
            .unwrap()
            .items
            .len(),
        1
    );
    assert_eq!(
        service.get(&other_doctor, first.id).unwrap_err().code(),
        "not_found"
    );
    assert!(matches!(
        service.list(&pharmacist, None, page).unwrap_err(),
        ServiceError::Forbidden(_)
    ));
}
