use meals_core::db::open_db_in_memory;
use meals_core::{
    parse_clock_time, SqliteTimingRepository, TimingService, TimingServiceError, TimingStep,
    TimingValidationError, Timings,
};
use rusqlite::Connection;

fn service(conn: &Connection) -> TimingService<SqliteTimingRepository<'_>> {
    TimingService::new(SqliteTimingRepository::try_new(conn).unwrap())
}

fn sunday_roast() -> Timings {
    Timings::new(
        parse_clock_time("18:00").unwrap(),
        vec![
            TimingStep::new("Lamb in", -120),
            TimingStep::new("Potatoes in", -60),
            TimingStep::new("Rest lamb", -20),
            TimingStep::new("Serve", 0),
        ],
    )
}

#[test]
fn get_on_fresh_database_is_none() {
    let conn = open_db_in_memory().unwrap();
    let timings = service(&conn);

    assert_eq!(timings.get().unwrap(), None);
    assert!(timings.schedule().unwrap().is_none());
}

#[test]
fn create_then_get_preserves_finish_time_and_step_order() {
    let conn = open_db_in_memory().unwrap();
    let timings = service(&conn);

    timings.create(&sunday_roast()).unwrap();

    assert_eq!(timings.get().unwrap(), Some(sunday_roast()));
}

#[test]
fn second_create_is_rejected_and_keeps_first_sheet() {
    let conn = open_db_in_memory().unwrap();
    let timings = service(&conn);
    timings.create(&sunday_roast()).unwrap();

    let other = Timings::new(parse_clock_time("12:30").unwrap(), Vec::new());
    let err = timings.create(&other).unwrap_err();

    assert!(matches!(err, TimingServiceError::AlreadyExists));
    assert_eq!(timings.get().unwrap(), Some(sunday_roast()));
}

#[test]
fn save_creates_then_replaces_steps() {
    let conn = open_db_in_memory().unwrap();
    let timings = service(&conn);

    assert!(timings.save(&sunday_roast()).unwrap());

    let shorter = Timings::new(
        parse_clock_time("19:15").unwrap(),
        vec![TimingStep::new("Chicken in", -90)],
    );
    assert!(!timings.save(&shorter).unwrap());
    assert_eq!(timings.get().unwrap(), Some(shorter));

    let step_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM timing_steps;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(step_rows, 1);
}

#[test]
fn positive_offsets_are_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let timings = service(&conn);
    let late = Timings::new(
        parse_clock_time("18:00").unwrap(),
        vec![TimingStep::new("Gravy", 10)],
    );

    let err = timings.save(&late).unwrap_err();
    assert!(matches!(
        err,
        TimingServiceError::Invalid(TimingValidationError::OffsetAfterFinish {
            position: 0,
            offset_minutes: 10,
        })
    ));
    assert_eq!(timings.get().unwrap(), None);
}

#[test]
fn schedule_reports_clock_time_per_step() {
    let conn = open_db_in_memory().unwrap();
    let timings = service(&conn);
    timings.save(&sunday_roast()).unwrap();

    let (sheet, steps) = timings.schedule().unwrap().unwrap();
    assert_eq!(sheet, sunday_roast());
    let clock: Vec<(String, String)> = steps
        .iter()
        .map(|step| (step.description.clone(), step.at.format("%H:%M").to_string()))
        .collect();
    assert_eq!(
        clock,
        vec![
            ("Lamb in".to_string(), "16:00".to_string()),
            ("Potatoes in".to_string(), "17:00".to_string()),
            ("Rest lamb".to_string(), "17:40".to_string()),
            ("Serve".to_string(), "18:00".to_string()),
        ]
    );
}
