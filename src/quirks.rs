/// Points of historical divergence between interpreters, toggled one by one.
///
/// ROMs silently assume one dialect or the other, so each option flips
/// exactly one opcode family and leaves every other operation alone.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Quirks {
    /// 8XY6/8XYE shift VY into VX when set, otherwise they shift VX in place.
    pub shift_source_vy: bool,
    /// FX55/FX65 leave I = I + X + 1 when set, otherwise I is untouched.
    pub load_store_increments_i: bool,
    /// BNNN jumps to NNN + VX, X taken from the high nibble of NNN, when
    /// set; otherwise to NNN + V0.
    pub jump_offset_uses_vx: bool,
    /// DXYN drops pixels past the right/bottom edge when set, otherwise
    /// wraps them to the opposite side. The start coordinate always wraps.
    pub clip_sprite_wrap: bool,
}

impl Quirks {
    /// Behaviour of the original interpreter.
    pub const fn original() -> Self {
        Self {
            shift_source_vy: true,
            load_store_increments_i: true,
            jump_offset_uses_vx: false,
            clip_sprite_wrap: false,
        }
    }

    /// The dialect most later interpreters (and many ROMs) assume.
    pub const fn modern() -> Self {
        Self {
            shift_source_vy: false,
            load_store_increments_i: false,
            jump_offset_uses_vx: true,
            clip_sprite_wrap: true,
        }
    }
}

impl Default for Quirks {
    fn default() -> Self {
        Self::original()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_original() {
        assert_eq!(Quirks::default(), Quirks::original());
    }

    #[test]
    fn dialects_disagree_on_every_option() {
        let original = Quirks::original();
        let modern = Quirks::modern();
        assert_ne!(original.shift_source_vy, modern.shift_source_vy);
        assert_ne!(
            original.load_store_increments_i,
            modern.load_store_increments_i
        );
        assert_ne!(original.jump_offset_uses_vx, modern.jump_offset_uses_vx);
        assert_ne!(original.clip_sprite_wrap, modern.clip_sprite_wrap);
    }
}
