use chrono::{DateTime, Duration, DurationRound, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tenant_billing::billing::{
    rollover, BillingFrequency, BillingSchedule, BillingScheduleStatus, PgScheduleStore,
    ScheduleStore,
};

// key: billing-store-tests -> postgres schedule loading and settlement

async fn insert_schedule(
    pool: &PgPool,
    id: &str,
    tenant_id: &str,
    frequency: &str,
    status: &str,
    next_due_date: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO billing_schedules (id, tenant_id, label, amount, frequency, status, next_due_date) VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(tenant_id)
    .bind(format!("{id} fee"))
    .bind(Decimal::new(12550, 2))
    .bind(frequency)
    .bind(status)
    .bind(next_due_date)
    .execute(pool)
    .await
    .unwrap();
}

fn now() -> DateTime<Utc> {
    // Postgres keeps microseconds; trim so round-tripped values compare equal.
    Utc::now().duration_trunc(Duration::seconds(1)).unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn loads_only_active_schedules_in_due_order(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let now = now();

    insert_schedule(&pool, "late", "T1", "MONTHLY", "ACTIVE", now + Duration::days(9)).await;
    insert_schedule(&pool, "early", "T1", "YEARLY", "ACTIVE", now - Duration::days(4)).await;
    insert_schedule(&pool, "retired", "T1", "ONE_TIME", "INACTIVE", now - Duration::days(30)).await;
    insert_schedule(&pool, "other", "T2", "MONTHLY", "ACTIVE", now - Duration::days(1)).await;

    let store = PgScheduleStore::new(pool.clone());
    let schedules = store.load_active_schedules("T1").await.unwrap();

    let ids: Vec<&str> = schedules.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["early", "late"]);
    assert_eq!(schedules[0].frequency, BillingFrequency::Yearly);
    assert_eq!(schedules[0].amount, Decimal::new(12550, 2));
    assert_eq!(schedules[0].next_due_date, now - Duration::days(4));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn unknown_frequency_fails_the_load(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    sqlx::query("ALTER TABLE billing_schedules DROP CONSTRAINT billing_schedules_frequency_check")
        .execute(&pool)
        .await
        .unwrap();
    insert_schedule(&pool, "odd", "T1", "WEEKLY", "ACTIVE", now()).await;

    let store = PgScheduleStore::new(pool.clone());
    let err = store.load_active_schedules("T1").await.unwrap_err();
    assert!(format!("{err:#}").contains("WEEKLY"));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn settlement_records_payment_and_rolls_schedule(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let now = now();
    insert_schedule(&pool, "admission", "T1", "ONE_TIME", "ACTIVE", now - Duration::days(2)).await;

    let store = PgScheduleStore::new(pool.clone());
    let schedule = store
        .find_schedule("T1", "admission")
        .await
        .unwrap()
        .expect("schedule exists");
    let settled = BillingSchedule {
        status: BillingScheduleStatus::Inactive,
        ..schedule.clone()
    };
    assert!(store
        .record_settlement(&schedule, &settled, schedule.amount, now)
        .await
        .unwrap());

    let (status, payments): (String, i64) = sqlx::query_as(
        "SELECT status, (SELECT COUNT(*) FROM billing_payments WHERE schedule_id = $1) FROM billing_schedules WHERE id = $1",
    )
    .bind("admission")
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(status, "INACTIVE");
    assert_eq!(payments, 1);
    assert!(store.load_active_schedules("T1").await.unwrap().is_empty());
    assert!(store.find_schedule("T2", "admission").await.unwrap().is_none());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn settling_twice_from_one_snapshot_pays_once(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let now = now();
    let due = now - Duration::days(3);
    insert_schedule(&pool, "tuition", "T1", "MONTHLY", "ACTIVE", due).await;

    let store = PgScheduleStore::new(pool.clone());
    let snapshot = store
        .find_schedule("T1", "tuition")
        .await
        .unwrap()
        .expect("schedule exists");
    let settled = rollover::settle(&snapshot);

    let (first, second) = tokio::join!(
        store.record_settlement(&snapshot, &settled, snapshot.amount, now),
        store.record_settlement(&snapshot, &settled, snapshot.amount, now),
    );
    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(outcomes.iter().filter(|recorded| **recorded).count(), 1);

    let payments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM billing_payments WHERE schedule_id = $1")
            .bind("tuition")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(payments, 1);

    let current = store.find_schedule("T1", "tuition").await.unwrap().unwrap();
    assert_eq!(current.next_due_date, settled.next_due_date);
    assert_eq!(current.status, BillingScheduleStatus::Active);
}
