#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Intra,
    Inter,
}

impl FrameType {
    pub fn flag(self) -> bool {
        matches!(self, FrameType::Inter)
    }

    pub fn from_flag(inter: bool) -> Self {
        if inter { FrameType::Inter } else { FrameType::Intra }
    }
}

/// Summary of one coded frame, produced by both the encoder and the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub frame_number: u64,
    pub frame_type: FrameType,
    pub golomb_m: u32,
    pub intra_blocks: u32,
    pub inter_blocks: u32,
    /// Size of the frame record in bits, including its header fields.
    pub bits: u64,
}

impl FrameRecord {
    pub fn blocks(&self) -> u32 {
        self.intra_blocks + self.inter_blocks
    }
}
