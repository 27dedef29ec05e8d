use crate::error::{Error, ErrorKind};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

macro_rules! cores {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Processor core, named as in the `Dcore` attribute.
        #[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Core {
            $(
                #[display($name)]
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl FromStr for Core {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim() {
                    $($name => Ok(Core::$variant),)+
                    _ => exn::bail!(ErrorKind::InvalidValue {
                        field: "processor@Dcore",
                        value: value.to_string(),
                    }),
                }
            }
        }
    };
}

cores! {
    CortexM0 => "Cortex-M0",
    CortexM0Plus => "Cortex-M0+",
    CortexM1 => "Cortex-M1",
    CortexM3 => "Cortex-M3",
    CortexM4 => "Cortex-M4",
    CortexM7 => "Cortex-M7",
    CortexM23 => "Cortex-M23",
    CortexM33 => "Cortex-M33",
    CortexM35P => "Cortex-M35P",
    CortexM55 => "Cortex-M55",
    CortexM85 => "Cortex-M85",
    SC000 => "SC000",
    SC300 => "SC300",
    StarMC1 => "Star-MC1",
    ArmV8MBL => "ARMV8MBL",
    ArmV8MML => "ARMV8MML",
    ArmV81MML => "ARMV81MML",
    CortexR4 => "Cortex-R4",
    CortexR5 => "Cortex-R5",
    CortexR7 => "Cortex-R7",
    CortexR8 => "Cortex-R8",
    CortexA5 => "Cortex-A5",
    CortexA7 => "Cortex-A7",
    CortexA8 => "Cortex-A8",
    CortexA9 => "Cortex-A9",
    CortexA15 => "Cortex-A15",
    CortexA17 => "Cortex-A17",
    CortexA32 => "Cortex-A32",
    CortexA35 => "Cortex-A35",
    CortexA53 => "Cortex-A53",
    CortexA57 => "Cortex-A57",
    CortexA72 => "Cortex-A72",
    CortexA73 => "Cortex-A73",
}

/// Floating point unit of a core (`Dfpu`).
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fpu {
    #[default]
    #[display("none")]
    None,
    #[display("single precision")]
    SinglePrecision,
    #[display("double precision")]
    DoublePrecision,
}
impl FromStr for Fpu {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "FPU" | "SP_FPU" | "1" => Ok(Fpu::SinglePrecision),
            "DP_FPU" | "2" => Ok(Fpu::DoublePrecision),
            "NO_FPU" | "None" | "0" => Ok(Fpu::None),
            _ => exn::bail!(ErrorKind::InvalidValue {
                field: "processor@Dfpu",
                value: value.to_string(),
            }),
        }
    }
}

/// Memory protection unit of a core (`Dmpu`).
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mpu {
    #[default]
    #[display("not present")]
    NotPresent,
    #[display("present")]
    Present,
}
impl FromStr for Mpu {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "MPU" | "1" => Ok(Mpu::Present),
            "NO_MPU" | "None" | "0" => Ok(Mpu::NotPresent),
            _ => exn::bail!(ErrorKind::InvalidValue {
                field: "processor@Dmpu",
                value: value.to_string(),
            }),
        }
    }
}

/// One processor (or a set of identical ones) of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processor {
    pub core: Core,
    /// Number of identical cores (`Punits`).
    pub units: u8,
    pub fpu: Fpu,
    pub mpu: Mpu,
}

/// The processors of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Processors {
    /// One description shared by every core.
    Symmetric(Processor),
    /// Cores described individually, keyed by `Pname`.
    Asymmetric(BTreeMap<String, Processor>),
}
