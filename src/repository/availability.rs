//! Provider availability repository (hours, holidays, exceptions)

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use sqlx::{types::Json, FromRow, Pool, Postgres, Transaction};
use uuid::Uuid;

use super::{AvailabilityStore, StoreError, StoreResult};
use crate::{
    models::availability::HoursRange,
    scheduling::{
        DayException, ExceptionKind, Holiday, HolidayRule, LocalHours, ProviderAvailability,
        WeeklyHours,
    },
};

#[derive(FromRow)]
struct ProviderRow {
    time_zone: String,
    version: i64,
}

#[derive(FromRow)]
struct HoursRow {
    staff_id: Option<Uuid>,
    day_of_week: i16,
    open_time: NaiveTime,
    close_time: NaiveTime,
}

#[derive(FromRow)]
struct HolidayRow {
    id: Uuid,
    label: String,
    holiday_date: Option<NaiveDate>,
    month: Option<i16>,
    day: Option<i16>,
}

#[derive(FromRow)]
struct ExceptionRow {
    id: Uuid,
    staff_id: Option<Uuid>,
    exception_date: NaiveDate,
    closed: bool,
    hours: Json<Vec<HoursRange>>,
}

fn corrupt(what: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt availability row: {}", what))
}

impl TryFrom<HolidayRow> for Holiday {
    type Error = StoreError;

    fn try_from(row: HolidayRow) -> StoreResult<Self> {
        let rule = match (row.holiday_date, row.month, row.day) {
            (Some(date), _, _) => HolidayRule::OneOff { date },
            (None, Some(month), Some(day)) => HolidayRule::Annual {
                month: month as u32,
                day: day as u32,
            },
            _ => return Err(corrupt(format!("holiday {} has no date", row.id))),
        };
        Ok(Holiday {
            id: row.id,
            rule,
            label: row.label,
        })
    }
}

impl TryFrom<ExceptionRow> for DayException {
    type Error = StoreError;

    fn try_from(row: ExceptionRow) -> StoreResult<Self> {
        let kind = if row.closed {
            ExceptionKind::Closed
        } else {
            let hours = row
                .hours
                .0
                .iter()
                .map(|h| LocalHours::parse(&h.open_time, &h.close_time))
                .collect::<Result<Vec<_>, _>>()
                .map_err(corrupt)?;
            ExceptionKind::CustomHours(hours)
        };
        Ok(DayException {
            id: row.id,
            staff_id: row.staff_id,
            date: row.exception_date,
            kind,
        })
    }
}

#[derive(Clone)]
pub struct AvailabilityRepository {
    pool: Pool<Postgres>,
}

impl AvailabilityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Rebuild provider and staff weekly hours from flat rows
    fn group_hours(rows: Vec<HoursRow>) -> StoreResult<(WeeklyHours, BTreeMap<Uuid, WeeklyHours>)> {
        let mut provider = Vec::new();
        let mut staff: BTreeMap<Uuid, Vec<(u8, LocalHours)>> = BTreeMap::new();
        for row in rows {
            let hours = LocalHours::new(row.open_time, row.close_time).map_err(corrupt)?;
            let entry = (row.day_of_week as u8, hours);
            match row.staff_id {
                None => provider.push(entry),
                Some(staff_id) => staff.entry(staff_id).or_default().push(entry),
            }
        }

        let business_hours = WeeklyHours::new(provider).map_err(corrupt)?;
        let staff_hours = staff
            .into_iter()
            .map(|(id, entries)| Ok((id, WeeklyHours::new(entries).map_err(corrupt)?)))
            .collect::<StoreResult<BTreeMap<_, _>>>()?;
        Ok((business_hours, staff_hours))
    }

    async fn insert_children(
        tx: &mut Transaction<'_, Postgres>,
        availability: &ProviderAvailability,
    ) -> StoreResult<()> {
        let provider_id = availability.provider_id;

        let weeks = std::iter::once((None, &availability.business_hours)).chain(
            availability
                .staff_hours
                .iter()
                .map(|(id, week)| (Some(*id), week)),
        );
        for (staff_id, week) in weeks {
            for (day_of_week, hours) in week.entries() {
                sqlx::query(
                    r#"
                    INSERT INTO business_hours (provider_id, staff_id, day_of_week, open_time, close_time)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(provider_id)
                .bind(staff_id)
                .bind(day_of_week as i16)
                .bind(hours.open())
                .bind(hours.close())
                .execute(&mut **tx)
                .await?;
            }
        }

        for holiday in &availability.holidays {
            let (date, month, day) = match holiday.rule {
                HolidayRule::OneOff { date } => (Some(date), None, None),
                HolidayRule::Annual { month, day } => (None, Some(month as i16), Some(day as i16)),
            };
            sqlx::query(
                r#"
                INSERT INTO holidays (id, provider_id, label, holiday_date, month, day)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(holiday.id)
            .bind(provider_id)
            .bind(&holiday.label)
            .bind(date)
            .bind(month)
            .bind(day)
            .execute(&mut **tx)
            .await?;
        }

        for exception in &availability.exceptions {
            let (closed, hours) = match &exception.kind {
                ExceptionKind::Closed => (true, Vec::new()),
                ExceptionKind::CustomHours(hours) => (false, hours.iter().map(HoursRange::from).collect()),
            };
            sqlx::query(
                r#"
                INSERT INTO day_exceptions (id, provider_id, staff_id, exception_date, closed, hours)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(exception.id)
            .bind(provider_id)
            .bind(exception.staff_id)
            .bind(exception.date)
            .bind(closed)
            .bind(Json(hours))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AvailabilityStore for AvailabilityRepository {
    async fn create(&self, availability: &ProviderAvailability) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO provider_availability (provider_id, time_zone, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (provider_id) DO NOTHING
            "#,
        )
        .bind(availability.provider_id)
        .bind(availability.time_zone.name())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "provider {} is already registered",
                availability.provider_id
            )));
        }
        Self::insert_children(&mut tx, availability).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn load(&self, provider_id: Uuid) -> StoreResult<Option<ProviderAvailability>> {
        let provider = sqlx::query_as::<_, ProviderRow>(
            "SELECT time_zone, version FROM provider_availability WHERE provider_id = $1",
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(provider) = provider else {
            return Ok(None);
        };
        let time_zone: Tz = provider
            .time_zone
            .parse()
            .map_err(|_| corrupt(format!("unknown time zone '{}'", provider.time_zone)))?;

        let hours = sqlx::query_as::<_, HoursRow>(
            r#"
            SELECT staff_id, day_of_week, open_time, close_time
            FROM business_hours
            WHERE provider_id = $1
            ORDER BY staff_id NULLS FIRST, day_of_week, open_time
            "#,
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        let holidays = sqlx::query_as::<_, HolidayRow>(
            "SELECT id, label, holiday_date, month, day FROM holidays WHERE provider_id = $1 ORDER BY label",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        let exceptions = sqlx::query_as::<_, ExceptionRow>(
            r#"
            SELECT id, staff_id, exception_date, closed, hours
            FROM day_exceptions
            WHERE provider_id = $1
            ORDER BY exception_date
            "#,
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;

        let (business_hours, staff_hours) = Self::group_hours(hours)?;
        Ok(Some(ProviderAvailability {
            provider_id,
            time_zone,
            business_hours,
            staff_hours,
            holidays: holidays
                .into_iter()
                .map(Holiday::try_from)
                .collect::<StoreResult<_>>()?,
            exceptions: exceptions
                .into_iter()
                .map(DayException::try_from)
                .collect::<StoreResult<_>>()?,
            version: provider.version,
        }))
    }

    async fn save(&self, availability: &ProviderAvailability) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE provider_availability
            SET version = version + 1, time_zone = $3, modif_date = now()
            WHERE provider_id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(availability.provider_id)
        .bind(availability.version)
        .bind(availability.time_zone.name())
        .fetch_optional(&mut *tx)
        .await?;
        let version = version.ok_or(StoreError::VersionMismatch)?;

        for table in ["business_hours", "holidays", "day_exceptions"] {
            sqlx::query(&format!("DELETE FROM {} WHERE provider_id = $1", table))
                .bind(availability.provider_id)
                .execute(&mut *tx)
                .await?;
        }
        Self::insert_children(&mut tx, availability).await?;
        tx.commit().await?;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_group_hours_splits_provider_and_staff() {
        let staff = Uuid::new_v4();
        let rows = vec![
            HoursRow { staff_id: None, day_of_week: 0, open_time: time(9, 0), close_time: time(17, 0) },
            HoursRow { staff_id: Some(staff), day_of_week: 0, open_time: time(12, 0), close_time: time(14, 0) },
            HoursRow { staff_id: None, day_of_week: 4, open_time: time(20, 0), close_time: time(0, 0) },
        ];
        let (provider, staff_hours) = AvailabilityRepository::group_hours(rows).unwrap();
        assert_eq!(provider.entries().count(), 2);
        assert_eq!(staff_hours[&staff].day(0).unwrap()[0].label().0, "12:00");
    }

    #[test]
    fn test_holiday_row_without_date_is_corrupt() {
        let row = HolidayRow {
            id: Uuid::new_v4(),
            label: "broken".into(),
            holiday_date: None,
            month: Some(3),
            day: None,
        };
        assert!(matches!(Holiday::try_from(row), Err(StoreError::Backend(_))));
    }

    #[test]
    fn test_exception_row_hours_are_parsed() {
        let row = ExceptionRow {
            id: Uuid::new_v4(),
            staff_id: None,
            exception_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            closed: false,
            hours: Json(vec![HoursRange {
                open_time: "10:00".into(),
                close_time: "12:30".into(),
            }]),
        };
        let exception = DayException::try_from(row).unwrap();
        match exception.kind {
            ExceptionKind::CustomHours(hours) => assert_eq!(hours[0].label().1, "12:30"),
            ExceptionKind::Closed => panic!("expected custom hours"),
        }
    }
}
