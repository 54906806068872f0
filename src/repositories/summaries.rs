use crate::db::DbPool;
use crate::error::AppError;
use crate::models::{DailySummary, MonthlySummary};
use chrono::NaiveDate;

pub struct SummaryRepository;

const UNDEFINED_TABLE: &str = "42P01";

// Only undefined_table; a missing column or function is a real schema error
fn is_undefined_table(code: Option<&str>) -> bool {
    code == Some(UNDEFINED_TABLE)
}

/// Treat a missing summary table as "no rows yet" on read paths.
fn empty_if_undefined<T>(result: Result<Vec<T>, sqlx::Error>) -> Result<Vec<T>, AppError> {
    match result {
        Ok(rows) => Ok(rows),
        Err(sqlx::Error::Database(db_err)) if is_undefined_table(db_err.code().as_deref()) => {
            Ok(Vec::new())
        }
        Err(e) => Err(AppError::Db(e)),
    }
}

impl SummaryRepository {
    pub async fn daily_devices(pool: &DbPool) -> Result<Vec<String>, AppError> {
        empty_if_undefined(
            sqlx::query_scalar::<_, String>(
                "SELECT DISTINCT device_serial FROM daily_summaries ORDER BY device_serial",
            )
            .fetch_all(pool)
            .await,
        )
    }

    /// Daily rows of one device ordered by date. Bounds are inclusive.
    pub async fn daily(
        pool: &DbPool,
        device_serial: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DailySummary>, AppError> {
        empty_if_undefined(
            sqlx::query_as::<_, DailySummary>(
                r#"
                SELECT device_serial, summary_date, total_generation_kwh, peak_power_kw
                FROM daily_summaries
                WHERE device_serial = $1
                  AND ($2::date IS NULL OR summary_date >= $2)
                  AND ($3::date IS NULL OR summary_date <= $3)
                ORDER BY summary_date
                "#,
            )
            .bind(device_serial)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await,
        )
    }

    pub async fn monthly(
        pool: &DbPool,
        device_serial: &str,
    ) -> Result<Vec<MonthlySummary>, AppError> {
        empty_if_undefined(
            sqlx::query_as::<_, MonthlySummary>(
                r#"
                SELECT device_serial, summary_month, total_generation_kwh, peak_power_kw
                FROM monthly_summaries
                WHERE device_serial = $1
                ORDER BY summary_month
                "#,
            )
            .bind(device_serial)
            .fetch_all(pool)
            .await,
        )
    }

    pub async fn upsert_daily(pool: &DbPool, row: &DailySummary) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO daily_summaries (
                device_serial, summary_date, total_generation_kwh, peak_power_kw
            ) VALUES ($1, $2, $3, $4)
            ON CONFLICT (device_serial, summary_date) DO UPDATE SET
                total_generation_kwh = EXCLUDED.total_generation_kwh,
                peak_power_kw = EXCLUDED.peak_power_kw,
                updated_at = now()
            "#,
        )
        .bind(&row.device_serial)
        .bind(row.summary_date)
        .bind(row.total_generation_kwh)
        .bind(row.peak_power_kw)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Upsert every month of a batch in one statement.
    pub async fn upsert_monthly(pool: &DbPool, rows: &[MonthlySummary]) -> Result<(), AppError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut values_placeholders: Vec<String> = Vec::with_capacity(rows.len());
        let mut arg_index = 1;
        for _ in rows {
            values_placeholders.push(format!(
                "(${}, ${}, ${}, ${})",
                arg_index,
                arg_index + 1,
                arg_index + 2,
                arg_index + 3
            ));
            arg_index += 4;
        }

        let sql = format!(
            r#"
            INSERT INTO monthly_summaries (
                device_serial, summary_month, total_generation_kwh, peak_power_kw
            ) VALUES {}
            ON CONFLICT (device_serial, summary_month) DO UPDATE SET
                total_generation_kwh = EXCLUDED.total_generation_kwh,
                peak_power_kw = EXCLUDED.peak_power_kw,
                updated_at = now()
            "#,
            values_placeholders.join(", ")
        );

        let mut q = sqlx::query(&sql);
        for row in rows {
            q = q
                .bind(&row.device_serial)
                .bind(&row.summary_month)
                .bind(row.total_generation_kwh)
                .bind(row.peak_power_kw);
        }
        q.execute(pool).await?;
        Ok(())
    }
}
