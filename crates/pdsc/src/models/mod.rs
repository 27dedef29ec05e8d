mod alias;
mod device;
mod pack;
mod processor;

pub use self::alias::AliasRecord;
pub use self::device::{AlgorithmRef, DeviceRecord, MemoryAccess, MemoryRegion};
pub use self::pack::PackRef;
pub use self::processor::{Core, Fpu, Mpu, Processor, Processors};
