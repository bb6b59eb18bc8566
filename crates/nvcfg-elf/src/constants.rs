//! ELF constants used by the CUBIN reader.

pub const ELF_MAGIC: u32 = 0x464c_457f;
pub const ELF_CLASS_64: u8 = 2;
pub const ELF_DATA_LSB: u8 = 1;

pub const SHT_SYMTAB: u32 = 2;

pub const STT_FUNC: u8 = 2;
pub const STT_OBJECT: u8 = 1;

/// NVIDIA encodes the SM architecture generation in the low byte of
/// `e_flags` (sm_70 -> 70).
pub const EF_CUDA_SM_MASK: u32 = 0xff;
