//! GATT layout of the monitor and the byte format of each characteristic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expands an assigned 16-bit UUID onto the Bluetooth base UUID.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

pub const HEART_RATE_SERVICE: Uuid = uuid_from_u16(0x180D);
pub const HEART_RATE_MEASUREMENT: Uuid = uuid_from_u16(0x2A37);

pub const SPO2_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
pub const SPO2_CHAR: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

pub const THRESHOLD_SERVICE: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);
pub const THRESHOLD_CHAR: Uuid = Uuid::from_u128(0x6e400004_b5a3_f393_e0a9_e50e24dcca9e);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
    pub characteristics: Vec<Characteristic>,
}

/// Heart rate, SpO2 and threshold services, one characteristic each.
pub fn services() -> Vec<Service> {
    let read_notify = |uuid| Characteristic {
        uuid,
        read: true,
        write: false,
        notify: true,
    };
    vec![
        Service {
            uuid: HEART_RATE_SERVICE,
            characteristics: vec![read_notify(HEART_RATE_MEASUREMENT)],
        },
        Service {
            uuid: SPO2_SERVICE,
            characteristics: vec![read_notify(SPO2_CHAR)],
        },
        Service {
            uuid: THRESHOLD_SERVICE,
            characteristics: vec![Characteristic {
                uuid: THRESHOLD_CHAR,
                read: true,
                write: true,
                notify: true,
            }],
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    HeartRate,
    SpO2,
}

/// A vital sign ready to be published to the central.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub kind: ReadingKind,
    pub value: u32,
    pub taken_at: DateTime<Utc>,
}

impl Reading {
    pub fn heart_rate(bpm: u32) -> Self {
        Self {
            kind: ReadingKind::HeartRate,
            value: bpm,
            taken_at: Utc::now(),
        }
    }

    pub fn spo2(percent: u8) -> Self {
        Self {
            kind: ReadingKind::SpO2,
            value: u32::from(percent),
            taken_at: Utc::now(),
        }
    }

    pub fn characteristic(&self) -> Uuid {
        match self.kind {
            ReadingKind::HeartRate => HEART_RATE_MEASUREMENT,
            ReadingKind::SpO2 => SPO2_CHAR,
        }
    }

    /// Heart rate: `[flags = 0x00, bpm]` (8-bit format, saturating).
    /// SpO2: `[percent]`.
    pub fn payload(&self) -> Vec<u8> {
        let value = u8::try_from(self.value).unwrap_or(u8::MAX);
        match self.kind {
            ReadingKind::HeartRate => vec![0x00, value],
            ReadingKind::SpO2 => vec![value],
        }
    }
}
