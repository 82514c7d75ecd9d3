// src/common/time_window.rs

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::error::AppError;

/// Janela de tempo usada nos filtros de leads e vendas.
///
/// `week` começa na segunda-feira à meia-noite local (semana ISO), tanto para
/// leads quanto para vendas e para os agrupamentos semanais dos relatórios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Custom,
}

/// Intervalo meio-aberto `[from, to)` em UTC. `None` = sem limite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at < to)
    }

    /// Datas de calendário inclusivas (`start` e `end` entram no intervalo).
    pub fn between_dates<Tz: TimeZone>(
        tz: &Tz,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, AppError> {
        if end < start {
            return Err(AppError::validation(
                "A data final deve ser igual ou posterior à data inicial.",
            ));
        }

        Ok(Self {
            from: Some(start_of_day(tz, start)),
            to: Some(start_of_day(tz, day_after(end)?)),
        })
    }
}

impl TimeWindow {
    pub fn resolve<Tz: TimeZone>(
        self,
        now: &DateTime<Tz>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<DateRange, AppError> {
        let tz = now.timezone();
        let today = now.date_naive();

        let from = match self {
            TimeWindow::Day => today,
            TimeWindow::Week => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            TimeWindow::Month => today.with_day(1).unwrap_or(today),
            TimeWindow::Custom => {
                let (Some(start), Some(end)) = (start, end) else {
                    return Err(AppError::validation(
                        "A janela 'custom' exige as datas 'start' e 'end'.",
                    ));
                };
                return DateRange::between_dates(&tz, start, end);
            }
        };

        Ok(DateRange {
            from: Some(start_of_day(&tz, from)),
            to: None,
        })
    }
}

/// Resolve a janela a partir do relógio local do servidor.
pub fn resolve_local(
    window: Option<TimeWindow>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<DateRange, AppError> {
    let now = chrono::Local::now();
    match window {
        Some(window) => window.resolve(&now, start, end),
        // Sem janela explícita, `start`/`end` soltos ainda funcionam como filtro
        None => match (start, end) {
            (Some(start), Some(end)) => DateRange::between_dates(&now.timezone(), start, end),
            (Some(start), None) => Ok(DateRange {
                from: Some(start_of_day(&now.timezone(), start)),
                to: None,
            }),
            (None, Some(end)) => Ok(DateRange {
                from: None,
                to: Some(start_of_day(&now.timezone(), day_after(end)?)),
            }),
            (None, None) => Ok(DateRange::unbounded()),
        },
    }
}

// Fim exclusivo de um intervalo com `end` inclusivo
fn day_after(end: NaiveDate) -> Result<NaiveDate, AppError> {
    end.succ_opt()
        .ok_or_else(|| AppError::validation("A data final está fora do intervalo suportado."))
}

/// Meia-noite local de `date`, convertida para UTC.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Meia-noite inexistente (horário de verão): usa o próprio relógio de parede em UTC
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

/// Agrupamento dos relatórios por período.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportBucket {
    Day,
    Week,
    #[default]
    Month,
}

impl ReportBucket {
    pub fn label<Tz: TimeZone>(self, at: DateTime<Utc>, tz: &Tz) -> String {
        let date = at.with_timezone(tz).date_naive();
        match self {
            ReportBucket::Day => date.format("%Y-%m-%d").to_string(),
            ReportBucket::Week => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            ReportBucket::Month => date.format("%Y-%m").to_string(),
        }
    }
}
