//! Bit-field words.
//!
//! The firmware header declares these as C bit-fields. Their layout is pinned
//! here as explicit shifts and masks over a `u32`; the raw word is kept as is,
//! so reserved bits survive a decode/encode cycle untouched.

use crate::enums::DebugVmidOp;
use crate::error::AbiError;
use serde::{Deserialize, Serialize};

macro_rules! bitfield {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( flag $flag:ident / $set_flag:ident @ $fshift:literal; )*
            $( field $field:ident / $set_field:ident @ $shift:literal : $width:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Bits not assigned to any named flag or field.
            pub const RESERVED_MASK: u32 = !(0 $( | (1u32 << $fshift) )* $( | (((1u64 << $width) - 1) as u32) << $shift )*);

            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn reserved_bits(self) -> u32 {
                self.0 & Self::RESERVED_MASK
            }

            $(
                pub const fn $flag(self) -> bool {
                    self.0 & (1 << $fshift) != 0
                }

                pub const fn $set_flag(self, on: bool) -> Self {
                    if on {
                        Self(self.0 | (1 << $fshift))
                    } else {
                        Self(self.0 & !(1 << $fshift))
                    }
                }
            )*

            $(
                pub const fn $field(self) -> u32 {
                    (self.0 >> $shift) & (((1u64 << $width) - 1) as u32)
                }

                pub fn $set_field(self, value: u32) -> Result<Self, AbiError> {
                    let mask = ((1u64 << $width) - 1) as u32;
                    if value & !mask != 0 {
                        return Err(AbiError::BitfieldOverflow {
                            field: stringify!($field),
                            value,
                            width: $width,
                        });
                    }
                    Ok(Self((self.0 & !(mask << $shift)) | (value << $shift)))
                }
            )*
        }
    };
}

bitfield! {
    /// Global behaviour switches passed in SET_HW_RSRC.
    pub struct HwResourcesFlags {
        flag disable_reset / with_disable_reset @ 0;
        flag use_different_vmid_compute / with_use_different_vmid_compute @ 1;
        flag disable_mes_log / with_disable_mes_log @ 2;
        flag apply_mmhub_pgvm_invalidate_ack_loss_wa / with_apply_mmhub_pgvm_invalidate_ack_loss_wa @ 3;
        flag apply_grbm_remote_register_dummy_read_wa / with_apply_grbm_remote_register_dummy_read_wa @ 4;
        flag second_gfx_pipe_enabled / with_second_gfx_pipe_enabled @ 5;
        flag enable_level_process_quantum_check / with_enable_level_process_quantum_check @ 6;
        flag legacy_sch_mode / with_legacy_sch_mode @ 7;
        flag disable_add_queue_wptr_mc_addr / with_disable_add_queue_wptr_mc_addr @ 8;
        flag enable_mes_event_int_logging / with_enable_mes_event_int_logging @ 9;
        flag enable_reg_active_poll / with_enable_reg_active_poll @ 10;
        flag use_disable_queue_in_legacy_uq_preemption / with_use_disable_queue_in_legacy_uq_preemption @ 11;
        flag send_write_data / with_send_write_data @ 12;
        flag os_tdr_timeout_override / with_os_tdr_timeout_override @ 13;
        flag use_rs64mem_for_proc_gang_ctx / with_use_rs64mem_for_proc_gang_ctx @ 14;
        flag halt_on_misaligned_access / with_halt_on_misaligned_access @ 15;
        flag use_add_queue_unmap_flag_addr / with_use_add_queue_unmap_flag_addr @ 16;
        flag enable_mes_sch_stb_log / with_enable_mes_sch_stb_log @ 17;
        flag limit_single_process / with_limit_single_process @ 18;
        flag enable_mes_fence_int / with_enable_mes_fence_int @ 21;
        field unmapped_doorbell_handling / with_unmapped_doorbell_handling @ 19 : 2;
    }
}

bitfield! {
    /// Flag word of SET_HW_RSRC_1.
    pub struct HwResources1Flags {
        flag enable_mes_debug_ctx / with_enable_mes_debug_ctx @ 0;
    }
}

bitfield! {
    /// Per-queue behaviour flags of ADD_QUEUE.
    pub struct QueueFlags {
        flag paging / with_paging @ 0;
        flag program_gds / with_program_gds @ 5;
        flag is_gang_suspended / with_is_gang_suspended @ 6;
        flag is_tmz_queue / with_is_tmz_queue @ 7;
        flag map_kiq_utility_queue / with_map_kiq_utility_queue @ 8;
        flag is_kfd_process / with_is_kfd_process @ 9;
        flag trap_en / with_trap_en @ 10;
        flag is_aql_queue / with_is_aql_queue @ 11;
        flag skip_process_ctx_clear / with_skip_process_ctx_clear @ 12;
        flag map_legacy_kq / with_map_legacy_kq @ 13;
        flag exclusively_scheduled / with_exclusively_scheduled @ 14;
        flag is_long_running / with_is_long_running @ 15;
        flag is_dwm_queue / with_is_dwm_queue @ 16;
        field debug_vmid / with_debug_vmid @ 1 : 4;
    }
}

bitfield! {
    /// Flag word of REMOVE_QUEUE. Bit 0 is reserved.
    pub struct RemoveQueueFlags {
        flag unmap_kiq_utility_queue / with_unmap_kiq_utility_queue @ 1;
        flag preempt_legacy_gfx_queue / with_preempt_legacy_gfx_queue @ 2;
        flag unmap_legacy_queue / with_unmap_legacy_queue @ 3;
    }
}

bitfield! {
    /// Queue quantum override carried by gang priority changes.
    pub struct QueueQuantumFlags {
        flag apply_quantum_all_processes / with_apply_quantum_all_processes @ 10;
        field queue_quantum_scale / with_queue_quantum_scale @ 0 : 2;
        field queue_quantum_duration / with_queue_quantum_duration @ 2 : 8;
    }
}

bitfield! {
    /// Scope word of SUSPEND.
    pub struct SuspendFlags {
        flag suspend_all_gangs / with_suspend_all_gangs @ 0;
    }
}

bitfield! {
    /// Scope word of RESUME.
    pub struct ResumeFlags {
        flag resume_all_gangs / with_resume_all_gangs @ 0;
    }
}

bitfield! {
    /// Detection and action modes of RESET.
    ///
    /// The three modes are independent bits. `hang_detect_only` wins: when it
    /// is set the firmware never resets, whatever else is requested.
    pub struct ResetFlags {
        flag reset_queue_only / with_reset_queue_only @ 0;
        flag hang_detect_then_reset / with_hang_detect_then_reset @ 1;
        flag hang_detect_only / with_hang_detect_only @ 2;
        flag reset_legacy_gfx / with_reset_legacy_gfx @ 3;
        flag use_connected_queue_index / with_use_connected_queue_index @ 4;
        flag use_connected_queue_index_p1 / with_use_connected_queue_index_p1 @ 5;
    }
}

impl ResetFlags {
    /// True when the request may end in a queue reset.
    pub const fn resets(self) -> bool {
        !self.hang_detect_only()
            && (self.reset_queue_only() || self.hang_detect_then_reset() || self.reset_legacy_gfx())
    }
}

bitfield! {
    /// Flag word of SET_DEBUG_VMID.
    pub struct DebugVmidFlags {
        flag use_gds / with_use_gds @ 0;
        field operation_bits / with_operation_bits @ 1 : 2;
    }
}

impl DebugVmidFlags {
    pub fn operation(self) -> DebugVmidOp {
        // Every 2-bit value names an operation.
        DebugVmidOp::from_raw(self.operation_bits()).unwrap_or_default()
    }

    pub fn with_operation(self, op: DebugVmidOp) -> Self {
        Self((self.0 & !(0b11 << 1)) | (op.raw() << 1))
    }
}

bitfield! {
    /// Option word of MISC/READ_REG.
    pub struct ReadRegOption {
        flag read_64_bits / with_read_64_bits @ 0;
    }
}

bitfield! {
    /// Single-step switches of MISC/SET_SHADER_DEBUGGER.
    pub struct ShaderDebuggerFlags {
        flag single_memop / with_single_memop @ 0;
        flag single_alu_op / with_single_alu_op @ 1;
    }
}

bitfield! {
    /// Option bits of MISC/CHANGE_CONFIG.
    pub struct ChangeConfigBits {
        flag limit_single_process / with_limit_single_process @ 0;
        flag enable_hws_logging_buffer / with_enable_hws_logging_buffer @ 1;
    }
}

bitfield! {
    /// Flag word of SET_SE_MODE.
    pub struct SeModeFlags {
        flag log_seq_time / with_log_seq_time @ 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_flags_match_header_layout() {
        let flags = QueueFlags::default()
            .with_paging(true)
            .with_debug_vmid(0xA)
            .expect("4-bit vmid")
            .with_is_aql_queue(true)
            .with_is_dwm_queue(true);
        assert_eq!(flags.bits(), 1 | (0xA << 1) | (1 << 11) | (1 << 16));
        assert_eq!(flags.debug_vmid(), 0xA);
        assert!(flags.is_aql_queue());
        assert!(!flags.is_tmz_queue());
        assert_eq!(QueueFlags::RESERVED_MASK, !0x1_FFFF);
    }

    #[test]
    fn multi_bit_fields_reject_overflow() {
        assert_eq!(
            QueueFlags::default().with_debug_vmid(16),
            Err(AbiError::BitfieldOverflow {
                field: "debug_vmid",
                value: 16,
                width: 4
            })
        );
        let quantum = QueueQuantumFlags::default()
            .with_queue_quantum_scale(3)
            .and_then(|q| q.with_queue_quantum_duration(0xFF))
            .expect("in range")
            .with_apply_quantum_all_processes(true);
        assert_eq!(quantum.bits(), 0x7FF);
        assert!(quantum.with_queue_quantum_scale(4).is_err());
    }

    #[test]
    fn hw_resources_two_bit_field_sits_between_flags() {
        let flags = HwResourcesFlags::default()
            .with_unmapped_doorbell_handling(2)
            .expect("2 bits")
            .with_enable_mes_fence_int(true);
        assert_eq!(flags.bits(), (2 << 19) | (1 << 21));
        assert_eq!(HwResourcesFlags::RESERVED_MASK, !0x3F_FFFF);
    }

    #[test]
    fn reset_detect_only_suppresses_reset() {
        let flags = ResetFlags::default()
            .with_reset_queue_only(true)
            .with_hang_detect_only(true);
        assert!(!flags.resets());
        assert!(flags.with_hang_detect_only(false).resets());
        assert!(!ResetFlags::default().resets());
    }

    #[test]
    fn debug_vmid_operation_round_trips() {
        for op in DebugVmidOp::ALL {
            let flags = DebugVmidFlags::default().with_use_gds(true).with_operation(*op);
            assert_eq!(flags.operation(), *op);
            assert!(flags.use_gds());
        }
    }

    #[test]
    fn reserved_bits_are_preserved() {
        let flags = RemoveQueueFlags::from_bits(0xF000_0001).with_unmap_legacy_queue(true);
        assert_eq!(flags.reserved_bits(), 0xF000_0001);
        assert!(flags.unmap_legacy_queue());
    }
}
