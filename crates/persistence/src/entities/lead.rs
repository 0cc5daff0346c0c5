//! Lead entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::lead::{Lead, LeadStatus, Platform, TempStatus};

/// Database enum for the coarse lead status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "lead_status")]
pub enum LeadStatusDb {
    #[sqlx(rename = "activo")]
    Active,
    #[sqlx(rename = "convertido")]
    Converted,
    #[sqlx(rename = "perdido")]
    Lost,
    #[sqlx(rename = "no_valido")]
    Invalid,
    #[sqlx(rename = "devolucion")]
    Returned,
}

impl From<LeadStatusDb> for LeadStatus {
    fn from(db: LeadStatusDb) -> Self {
        match db {
            LeadStatusDb::Active => LeadStatus::Active,
            LeadStatusDb::Converted => LeadStatus::Converted,
            LeadStatusDb::Lost => LeadStatus::Lost,
            LeadStatusDb::Invalid => LeadStatus::Invalid,
            LeadStatusDb::Returned => LeadStatus::Returned,
        }
    }
}

impl From<LeadStatus> for LeadStatusDb {
    fn from(status: LeadStatus) -> Self {
        match status {
            LeadStatus::Active => LeadStatusDb::Active,
            LeadStatus::Converted => LeadStatusDb::Converted,
            LeadStatus::Lost => LeadStatusDb::Lost,
            LeadStatus::Invalid => LeadStatusDb::Invalid,
            LeadStatus::Returned => LeadStatusDb::Returned,
        }
    }
}

/// Database enum for the working sub-status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "lead_temp_status")]
pub enum TempStatusDb {
    #[sqlx(rename = "sin_tratar")]
    Untreated,
    #[sqlx(rename = "no_contesta")]
    NoAnswer,
    #[sqlx(rename = "no_valido")]
    Invalid,
    #[sqlx(rename = "gestion")]
    InProgress,
    #[sqlx(rename = "convertido")]
    Converted,
    #[sqlx(rename = "no_cerrado")]
    NotClosed,
}

impl From<TempStatusDb> for TempStatus {
    fn from(db: TempStatusDb) -> Self {
        match db {
            TempStatusDb::Untreated => TempStatus::Untreated,
            TempStatusDb::NoAnswer => TempStatus::NoAnswer,
            TempStatusDb::Invalid => TempStatus::Invalid,
            TempStatusDb::InProgress => TempStatus::InProgress,
            TempStatusDb::Converted => TempStatus::Converted,
            TempStatusDb::NotClosed => TempStatus::NotClosed,
        }
    }
}

impl From<TempStatus> for TempStatusDb {
    fn from(status: TempStatus) -> Self {
        match status {
            TempStatus::Untreated => TempStatusDb::Untreated,
            TempStatus::NoAnswer => TempStatusDb::NoAnswer,
            TempStatus::Invalid => TempStatusDb::Invalid,
            TempStatus::InProgress => TempStatusDb::InProgress,
            TempStatus::Converted => TempStatusDb::Converted,
            TempStatus::NotClosed => TempStatusDb::NotClosed,
        }
    }
}

/// Database enum for the source platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "lead_platform", rename_all = "lowercase")]
pub enum PlatformDb {
    Facebook,
    Instagram,
    X,
    Tiktok,
    Callbell,
    Other,
}

impl From<PlatformDb> for Platform {
    fn from(db: PlatformDb) -> Self {
        match db {
            PlatformDb::Facebook => Platform::Facebook,
            PlatformDb::Instagram => Platform::Instagram,
            PlatformDb::X => Platform::X,
            PlatformDb::Tiktok => Platform::Tiktok,
            PlatformDb::Callbell => Platform::Callbell,
            PlatformDb::Other => Platform::Other,
        }
    }
}

impl From<Platform> for PlatformDb {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Facebook => PlatformDb::Facebook,
            Platform::Instagram => PlatformDb::Instagram,
            Platform::X => PlatformDb::X,
            Platform::Tiktok => PlatformDb::Tiktok,
            Platform::Callbell => PlatformDb::Callbell,
            Platform::Other => PlatformDb::Other,
        }
    }
}

/// Database row mapping for the leads table.
#[derive(Debug, Clone, FromRow)]
pub struct LeadEntity {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub platform: PlatformDb,
    pub quality: i32,
    pub notes: Option<String>,
    pub company_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: LeadStatusDb,
    pub temp_status: TempStatusDb,
    pub entered_at: DateTime<Utc>,
    pub company_assigned_at: Option<DateTime<Utc>>,
    pub agent_assigned_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<LeadEntity> for Lead {
    fn from(entity: LeadEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            phone: entity.phone,
            platform: entity.platform.into(),
            quality: entity.quality,
            notes: entity.notes,
            company_id: entity.company_id,
            user_id: entity.user_id,
            status: entity.status.into(),
            temp_status: entity.temp_status.into(),
            entered_at: entity.entered_at,
            company_assigned_at: entity.company_assigned_at,
            agent_assigned_at: entity.agent_assigned_at,
        }
    }
}
