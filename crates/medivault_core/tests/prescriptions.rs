mod support;

use medivault_core::db::open_db_in_memory;
use medivault_core::model::prescription::PrescriptionDraft;
use medivault_core::{
    AppointmentService, BookAppointmentRequest, PageRequest, PrescriptionService,
    PrescriptionStatus, Role, ServiceError, UserId,
};
use support::{create_user, unread, FUTURE_MS};

fn draft(patient_id: UserId) -> PrescriptionDraft {
    PrescriptionDraft {
        patient_id,
        appointment_id: None,
        medication: " Amoxicillin ".to_string(),
        dosage: "500 mg".to_string(),
        frequency: "3x daily".to_string(),
        duration_days: 7,
        instructions: Some("with food".to_string()),
    }
}

#[test]
fn doctor_writes_prescription_and_pharmacists_are_alerted() {
    let conn = open_db_in_memory().unwrap();
    let (doctor, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let (_, rx_one) = create_user(&conn, Role::Pharmacist, "rx1@example.com");
    let (_, rx_two) = create_user(&conn, Role::Pharmacist, "rx2@example.com");
    let service = PrescriptionService::from_connection(&conn).unwrap();

    let created = service.create(&doctor_p, draft(patient.id)).unwrap();
    assert_eq!(created.status, PrescriptionStatus::Active);
    assert_eq!(created.doctor_id, doctor.id);
    assert_eq!(created.medication, "Amoxicillin");

    assert_eq!(unread(&conn, &patient_p), 1);
    assert_eq!(unread(&conn, &rx_one), 1);
    assert_eq!(unread(&conn, &rx_two), 1);
}

#[test]
fn only_prescribers_may_write() {
    let conn = open_db_in_memory().unwrap();
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let (_, pharmacist) = create_user(&conn, Role::Pharmacist, "rx@example.com");
    let service = PrescriptionService::from_connection(&conn).unwrap();

    for caller in [&patient_p, &pharmacist] {
        let err = service.create(caller, draft(patient.id)).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}

#[test]
fn draft_is_validated_against_patient_and_duration() {
    let conn = open_db_in_memory().unwrap();
    let (doctor, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (patient, _) = create_user(&conn, Role::Patient, "pat@example.com");
    let service = PrescriptionService::from_connection(&conn).unwrap();

    let mut zero_days = draft(patient.id);
    zero_days.duration_days = 0;
    assert_eq!(
        service.create(&doctor_p, zero_days).unwrap_err().code(),
        "validation_error"
    );

    assert_eq!(
        service.create(&doctor_p, draft(doctor.id)).unwrap_err().code(),
        "validation_error"
    );
}

#[test]
fn linked_appointment_must_match_doctor_and_patient() {
    let conn = open_db_in_memory().unwrap();
    let (doctor, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (_, other_doctor) = create_user(&conn, Role::Doctor, "doc2@example.com");
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let appointment = AppointmentService::from_connection(&conn)
        .unwrap()
        .book(
            &patient_p,
            BookAppointmentRequest {
                patient_id: None,
                doctor_id: doctor.id,
                scheduled_at: FUTURE_MS,
                reason: "rash".to_string(),
                notes: None,
            },
        )
        .unwrap();
    let service = PrescriptionService::from_connection(&conn).unwrap();

    let mut linked = draft(patient.id);
    linked.appointment_id = Some(appointment.id);
    let created = service.create(&doctor_p, linked.clone()).unwrap();
    assert_eq!(created.appointment_id, Some(appointment.id));

    let err = service.create(&other_doctor, linked).unwrap_err();
    assert_eq!(err.code(), "validation_error");
}

#[test]
fn dispense_records_pharmacist_once() {
    let conn = open_db_in_memory().unwrap();
    let (_, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let (pharmacist, pharmacist_p) = create_user(&conn, Role::Pharmacist, "rx@example.com");
    let service = PrescriptionService::from_connection(&conn).unwrap();
    let created = service.create(&doctor_p, draft(patient.id)).unwrap();

    let dispensed = service.dispense(&pharmacist_p, created.id).unwrap();
    assert_eq!(dispensed.status, PrescriptionStatus::Dispensed);
    assert_eq!(dispensed.dispensed_by, Some(pharmacist.id));
    assert!(dispensed.dispensed_at.is_some());
    assert_eq!(unread(&conn, &patient_p), 2);
    assert_eq!(unread(&conn, &doctor_p), 1);

    let again = service.dispense(&pharmacist_p, created.id).unwrap_err();
    assert!(matches!(again, ServiceError::InvalidTransition { .. }));

    let doctor_dispense = service.dispense(&doctor_p, created.id).unwrap_err();
    assert!(matches!(doctor_dispense, ServiceError::Forbidden(_)));
}

#[test]
fn cancel_is_limited_to_prescriber_and_admin() {
    let conn = open_db_in_memory().unwrap();
    let (_, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (_, other_doctor) = create_user(&conn, Role::Doctor, "doc2@example.com");
    let (_, admin) = create_user(&conn, Role::Admin, "admin@example.com");
    let (patient, _) = create_user(&conn, Role::Patient, "pat@example.com");
    let service = PrescriptionService::from_connection(&conn).unwrap();

    let first = service.create(&doctor_p, draft(patient.id)).unwrap();
    assert_eq!(
        service.cancel(&other_doctor, first.id).unwrap_err().code(),
        "not_found"
    );
    let cancelled = service.cancel(&doctor_p, first.id).unwrap();
    assert_eq!(cancelled.status, PrescriptionStatus::Cancelled);

    let second = service.create(&doctor_p, draft(patient.id)).unwrap();
    assert_eq!(
        service.cancel(&admin, second.id).unwrap().status,
        PrescriptionStatus::Cancelled
    );
}

#[test]
fn listing_is_scoped_by_role() {
    let conn = open_db_in_memory().unwrap();
    let (_, doctor_p) = create_user(&conn, Role::Doctor, "doc@example.com");
    let (_, other_doctor) = create_user(&conn, Role::Doctor, "doc2@example.com");
    let (patient, patient_p) = create_user(&conn, Role::Patient, "pat@example.com");
    let (other_patient, other_patient_p) = create_user(&conn, Role::Patient, "pat2@example.com");
    let (_, pharmacist) = create_user(&conn, Role::Pharmacist, "rx@example.com");
    let (_, lab_tech) = create_user(&conn, Role::LabTechnician, "lab@example.com");
    let service = PrescriptionService::from_connection(&conn).unwrap();

    service.create(&doctor_p, draft(patient.id)).unwrap();
    service.create(&other_doctor, draft(other_patient.id)).unwrap();

    let page = PageRequest::default();
    assert_eq!(service.list(&patient_p, None, page).unwrap().items.len(), 1);
    assert_eq!(service.list(&other_patient_p, None, page).unwrap().items.len(), 1);
    assert_eq!(service.list(&doctor_p, None, page).unwrap().items.len(), 1);
    assert_eq!(service.list(&pharmacist, None, page).unwrap().items.len(), 2);
    assert_eq!(
        service
            .list(&pharmacist, Some(PrescriptionStatus::Dispensed), page)
            .unwrap()
            .items
            .len(),
        0
    );
    assert!(matches!(
        service.list(&lab_tech, None, page).unwrap_err(),
        ServiceError::Forbidden(_)
    ));
}
