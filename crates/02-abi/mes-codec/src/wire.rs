//! Per-opcode field layouts.
//!
//! `write` and `read` of each payload list the fields in the same order; that
//! order is the ABI.

use crate::error::{DecodeError, EncodeError};
use crate::frame::{FrameReader, FrameWriter};
use mes_abi::*;

pub(crate) trait Wire: Sized {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError>;
    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError>;
}

impl Wire for SetHwResources {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.vmid_mask_mmhub)?;
        w.u32(self.vmid_mask_gfxhub)?;
        w.u32(self.gds_size)?;
        w.u32(self.paging_vmid)?;
        w.u32s(&self.compute_hqd_mask)?;
        w.u32s(&self.gfx_hqd_mask)?;
        w.u32s(&self.sdma_hqd_mask)?;
        w.u32s(self.aggregated_doorbells.as_array())?;
        w.u64(self.g_sch_ctx_gpu_mc_ptr)?;
        w.u64(self.query_status_fence_gpu_mc_ptr)?;
        w.u32s(&self.gc_base)?;
        w.u32s(&self.mmhub_base)?;
        w.u32s(&self.osssys_base)?;
        w.status(&self.api_status)?;
        w.u32(self.flags.bits())?;
        w.u32(self.oversubscription_timer)?;
        w.u64(self.doorbell_info)?;
        w.u64(self.event_intr_history_gpu_mc_ptr)?;
        w.u64(self.timestamp)?;
        w.u32(self.os_tdr_timeout_in_sec)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            vmid_mask_mmhub: r.u32()?,
            vmid_mask_gfxhub: r.u32()?,
            gds_size: r.u32()?,
            paging_vmid: r.u32()?,
            compute_hqd_mask: r.u32s()?,
            gfx_hqd_mask: r.u32s()?,
            sdma_hqd_mask: r.u32s()?,
            aggregated_doorbells: PriorityBands::new(r.u32s()?),
            g_sch_ctx_gpu_mc_ptr: r.u64()?,
            query_status_fence_gpu_mc_ptr: r.u64()?,
            gc_base: r.u32s()?,
            mmhub_base: r.u32s()?,
            osssys_base: r.u32s()?,
            api_status: r.status()?,
            flags: HwResourcesFlags::from_bits(r.u32()?),
            oversubscription_timer: r.u32()?,
            doorbell_info: r.u64()?,
            event_intr_history_gpu_mc_ptr: r.u64()?,
            timestamp: r.u64()?,
            os_tdr_timeout_in_sec: r.u32()?,
        })
    }
}

impl Wire for SetHwResources1 {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.status(&self.api_status)?;
        w.u64(self.timestamp)?;
        w.u32(self.flags.bits())?;
        w.u64(self.mes_debug_ctx_mc_addr)?;
        w.u32(self.mes_debug_ctx_size)?;
        w.u32(self.mes_kiq_unmap_timeout)?;
        w.u64(self.reserved1)?;
        w.u64(self.cleaner_shader_fence_mc_addr)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            api_status: r.status()?,
            timestamp: r.u64()?,
            flags: HwResources1Flags::from_bits(r.u32()?),
            mes_debug_ctx_mc_addr: r.u64()?,
            mes_debug_ctx_size: r.u32()?,
            mes_kiq_unmap_timeout: r.u32()?,
            reserved1: r.u64()?,
            cleaner_shader_fence_mc_addr: r.u64()?,
        })
    }
}

impl Wire for SetSchedulingConfig {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        if self.normal_yield_percent > NORMAL_YIELD_PERCENT_MAX {
            return Err(EncodeError::FieldOutOfRange {
                field: "normal_yield_percent",
                value: u64::from(self.normal_yield_percent),
                max: u64::from(NORMAL_YIELD_PERCENT_MAX),
            });
        }
        w.u64s(self.grace_period_other_levels.as_array())?;
        w.u64s(self.process_quantum_for_level.as_array())?;
        w.u64s(self.process_grace_period_same_level.as_array())?;
        w.u32(self.normal_yield_percent)?;
        w.status(&self.api_status)?;
        w.u64(self.timestamp)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            grace_period_other_levels: PriorityBands::new(r.u64s()?),
            process_quantum_for_level: PriorityBands::new(r.u64s()?),
            process_grace_period_same_level: PriorityBands::new(r.u64s()?),
            normal_yield_percent: r
                .bounded_u32("normal_yield_percent", NORMAL_YIELD_PERCENT_MAX)?,
            api_status: r.status()?,
            timestamp: r.u64()?,
        })
    }
}

impl Wire for AddQueue {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.process_id)?;
        w.u64(self.page_table_base_addr)?;
        w.u64(self.process_va_start)?;
        w.u64(self.process_va_end)?;
        w.u64(self.process_quantum)?;
        w.u64(self.process_context_addr)?;
        w.u64(self.gang_quantum)?;
        w.u64(self.gang_context_addr)?;
        w.u32(self.inprocess_gang_priority)?;
        w.u32(self.gang_global_priority_level.raw())?;
        w.u32(self.doorbell_offset)?;
        w.u64(self.mqd_addr)?;
        w.u64(self.wptr_addr)?;
        w.u64(self.h_context)?;
        w.u64(self.h_queue)?;
        w.u32(self.queue_type.raw())?;
        w.u32(self.gds_base)?;
        w.u32(self.gds_size)?;
        w.u32(self.gws_base)?;
        w.u32(self.gws_size)?;
        w.u32(self.oa_mask)?;
        w.u64(self.trap_handler_addr)?;
        w.u32(self.vm_context_cntl)?;
        w.u32(self.flags.bits())?;
        w.status(&self.api_status)?;
        w.u64(self.tma_addr)?;
        w.u32(self.sch_id)?;
        w.u64(self.timestamp)?;
        w.u32(self.process_context_array_index)?;
        w.u32(self.gang_context_array_index)?;
        w.u32(self.pipe_id)?;
        w.u32(self.queue_id)?;
        w.gated_u32(
            "alignment_mode_setting",
            self.alignment_mode_setting,
            ApiVersion::HW_RESOURCES_1,
        )
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            process_id: r.u32()?,
            page_table_base_addr: r.u64()?,
            process_va_start: r.u64()?,
            process_va_end: r.u64()?,
            process_quantum: r.u64()?,
            process_context_addr: r.u64()?,
            gang_quantum: r.u64()?,
            gang_context_addr: r.u64()?,
            inprocess_gang_priority: r.u32()?,
            gang_global_priority_level: r.value()?,
            doorbell_offset: r.u32()?,
            mqd_addr: r.u64()?,
            wptr_addr: r.u64()?,
            h_context: r.u64()?,
            h_queue: r.u64()?,
            queue_type: r.value()?,
            gds_base: r.u32()?,
            gds_size: r.u32()?,
            gws_base: r.u32()?,
            gws_size: r.u32()?,
            oa_mask: r.u32()?,
            trap_handler_addr: r.u64()?,
            vm_context_cntl: r.u32()?,
            flags: QueueFlags::from_bits(r.u32()?),
            api_status: r.status()?,
            tma_addr: r.u64()?,
            sch_id: r.u32()?,
            timestamp: r.u64()?,
            process_context_array_index: r.u32()?,
            gang_context_array_index: r.u32()?,
            pipe_id: r.u32()?,
            queue_id: r.u32()?,
            alignment_mode_setting: r.gated_u32(ApiVersion::HW_RESOURCES_1)?,
        })
    }
}

impl Wire for RemoveQueue {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.doorbell_offset)?;
        w.u64(self.gang_context_addr)?;
        w.u32(self.flags.bits())?;
        w.status(&self.api_status)?;
        w.u32(self.pipe_id)?;
        w.u32(self.queue_id)?;
        w.u64(self.tf_addr)?;
        w.u32(self.tf_data)?;
        w.u32(self.queue_type.raw())?;
        w.u64(self.timestamp)?;
        w.u32(self.gang_context_array_index)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            doorbell_offset: r.u32()?,
            gang_context_addr: r.u64()?,
            flags: RemoveQueueFlags::from_bits(r.u32()?),
            api_status: r.status()?,
            pipe_id: r.u32()?,
            queue_id: r.u32()?,
            tf_addr: r.u64()?,
            tf_data: r.u32()?,
            queue_type: r.value()?,
            timestamp: r.u64()?,
            gang_context_array_index: r.u32()?,
        })
    }
}

impl Wire for PerformYield {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.dummy)?;
        w.status(&self.api_status)?;
        w.u64(self.timestamp)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            dummy: r.u32()?,
            api_status: r.status()?,
            timestamp: r.u64()?,
        })
    }
}

impl Wire for ChangeGangPriority {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.inprocess_gang_priority)?;
        w.u32(self.gang_global_priority_level.raw())?;
        w.u64(self.gang_quantum)?;
        w.u64(self.gang_context_addr)?;
        w.status(&self.api_status)?;
        w.u32(self.doorbell_offset)?;
        w.u64(self.timestamp)?;
        w.u32(self.gang_context_array_index)?;
        w.u32(self.queue_quantum.bits())
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            inprocess_gang_priority: r.u32()?,
            gang_global_priority_level: r.value()?,
            gang_quantum: r.u64()?,
            gang_context_addr: r.u64()?,
            api_status: r.status()?,
            doorbell_offset: r.u32()?,
            timestamp: r.u64()?,
            gang_context_array_index: r.u32()?,
            queue_quantum: QueueQuantumFlags::from_bits(r.u32()?),
        })
    }
}

impl Wire for Suspend {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.flags.bits())?;
        w.u64(self.gang_context_addr)?;
        w.u64(self.suspend_fence_addr)?;
        w.u32(self.suspend_fence_value)?;
        w.status(&self.api_status)?;
        w.u32(self.sch_id)?;
        w.u32(self.doorbell_offset)?;
        w.u64(self.timestamp)?;
        w.u32(self.legacy_uq_type.raw())?;
        w.u32(self.legacy_uq_priority_level.raw())?;
        w.u32(self.gang_context_array_index)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            flags: SuspendFlags::from_bits(r.u32()?),
            gang_context_addr: r.u64()?,
            suspend_fence_addr: r.u64()?,
            suspend_fence_value: r.u32()?,
            api_status: r.status()?,
            sch_id: r.u32()?,
            doorbell_offset: r.u32()?,
            timestamp: r.u64()?,
            legacy_uq_type: r.value()?,
            legacy_uq_priority_level: r.value()?,
            gang_context_array_index: r.u32()?,
        })
    }
}

impl Wire for Resume {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.flags.bits())?;
        w.u64(self.gang_context_addr)?;
        w.status(&self.api_status)?;
        w.u32(self.doorbell_offset)?;
        w.u64(self.timestamp)?;
        w.u32(self.gang_context_array_index)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            flags: ResumeFlags::from_bits(r.u32()?),
            gang_context_addr: r.u64()?,
            api_status: r.status()?,
            doorbell_offset: r.u32()?,
            timestamp: r.u64()?,
            gang_context_array_index: r.u32()?,
        })
    }
}

impl Wire for LegacyQueue {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.pipe_id)?;
        w.u32(self.queue_id)?;
        w.u32(self.vmid_id)?;
        w.u64(self.mqd_mc_addr)?;
        w.u32(self.doorbell_offset)?;
        w.u64(self.wptr_addr)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            pipe_id: r.u32()?,
            queue_id: r.u32()?,
            vmid_id: r.u32()?,
            mqd_mc_addr: r.u64()?,
            doorbell_offset: r.u32()?,
            wptr_addr: r.u64()?,
        })
    }
}

impl Wire for Reset {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.flags.bits())?;
        w.u64(self.gang_context_addr)?;
        w.u32(self.doorbell_offset)?;
        w.u64(self.doorbell_offset_addr)?;
        w.u32(self.queue_type.raw())?;
        self.legacy_lp.write(w)?;
        self.legacy_hp.write(w)?;
        w.status(&self.api_status)?;
        w.u32(self.active_vmids)?;
        w.u64(self.timestamp)?;
        w.u32(self.gang_context_array_index)?;
        w.gated_u32(
            "connected_queue_index",
            self.connected_queue_index,
            ApiVersion::GANG_SUBMIT,
        )?;
        w.gated_u32(
            "connected_queue_index_p1",
            self.connected_queue_index_p1,
            ApiVersion::GANG_SUBMIT,
        )
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            flags: ResetFlags::from_bits(r.u32()?),
            gang_context_addr: r.u64()?,
            doorbell_offset: r.u32()?,
            doorbell_offset_addr: r.u64()?,
            queue_type: r.value()?,
            legacy_lp: LegacyQueue::read(r)?,
            legacy_hp: LegacyQueue::read(r)?,
            api_status: r.status()?,
            active_vmids: r.u32()?,
            timestamp: r.u64()?,
            gang_context_array_index: r.u32()?,
            connected_queue_index: r.gated_u32(ApiVersion::GANG_SUBMIT)?,
            connected_queue_index_p1: r.gated_u32(ApiVersion::GANG_SUBMIT)?,
        })
    }
}

impl Wire for SetLogBuffer {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.log_type.raw())?;
        w.u64(self.logging_buffer_addr)?;
        w.u32(self.number_of_entries)?;
        w.u32(self.interrupt_entry)?;
        w.status(&self.api_status)?;
        w.u64(self.timestamp)?;
        w.u32(self.vmid)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            log_type: r.value()?,
            logging_buffer_addr: r.u64()?,
            number_of_entries: r.u32()?,
            interrupt_entry: r.u32()?,
            api_status: r.status()?,
            timestamp: r.u64()?,
            vmid: r.u32()?,
        })
    }
}

impl Wire for QuerySchedulerStatus {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.request.subopcode())?;
        w.status(&self.api_status)?;
        w.u64(self.timestamp)?;
        w.union(QUERY_MES_MAX_SIZE_IN_DWORDS, |w| match &self.request {
            QueryRequest::GetCtxArraySize {
                proc_ctx_array_size_addr,
                gang_ctx_array_size_addr,
            } => {
                w.u64(*proc_ctx_array_size_addr)?;
                w.u64(*gang_ctx_array_size_addr)
            }
            QueryRequest::CheckHealthy { healthy_addr } => w.u64(*healthy_addr),
            QueryRequest::Unknown { data, .. } => w.u32s(data),
        })
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        let subopcode = r.u32()?;
        let api_status = r.status()?;
        let timestamp = r.u64()?;
        let request = r.union(QUERY_MES_MAX_SIZE_IN_DWORDS, |r| {
            Ok(match QueryOpcode::from_raw(subopcode) {
                Some(QueryOpcode::GetCtxArraySize) => QueryRequest::GetCtxArraySize {
                    proc_ctx_array_size_addr: r.u64()?,
                    gang_ctx_array_size_addr: r.u64()?,
                },
                Some(QueryOpcode::CheckHealthy) => QueryRequest::CheckHealthy {
                    healthy_addr: r.u64()?,
                },
                None => QueryRequest::Unknown {
                    subopcode,
                    data: r.raw()?,
                },
            })
        })?;
        Ok(Self {
            request,
            api_status,
            timestamp,
        })
    }
}

impl Wire for SetDebugVmid {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.status(&self.api_status)?;
        w.u32(self.flags.bits())?;
        w.u32(self.reserved)?;
        w.u32(self.debug_vmid)?;
        w.u64(self.process_context_addr)?;
        w.u64(self.page_table_base_addr)?;
        w.u64(self.process_va_start)?;
        w.u64(self.process_va_end)?;
        w.u32(self.gds_base)?;
        w.u32(self.gds_size)?;
        w.u32(self.gws_base)?;
        w.u32(self.gws_size)?;
        w.u32(self.oa_mask)?;
        w.u64(self.output_addr)?;
        w.u64(self.timestamp)?;
        w.u32(self.process_vm_cntl)?;
        w.u32(self.queue_type.raw())?;
        w.u32(self.process_context_array_index)?;
        w.gated_u32(
            "alignment_mode_setting",
            self.alignment_mode_setting,
            ApiVersion::HW_RESOURCES_1,
        )
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            api_status: r.status()?,
            flags: DebugVmidFlags::from_bits(r.u32()?),
            reserved: r.u32()?,
            debug_vmid: r.u32()?,
            process_context_addr: r.u64()?,
            page_table_base_addr: r.u64()?,
            process_va_start: r.u64()?,
            process_va_end: r.u64()?,
            gds_base: r.u32()?,
            gds_size: r.u32()?,
            gws_base: r.u32()?,
            gws_size: r.u32()?,
            oa_mask: r.u32()?,
            output_addr: r.u64()?,
            timestamp: r.u64()?,
            process_vm_cntl: r.u32()?,
            queue_type: r.value()?,
            process_context_array_index: r.u32()?,
            alignment_mode_setting: r.gated_u32(ApiVersion::HW_RESOURCES_1)?,
        })
    }
}

fn write_misc_op(op: &MiscOp, w: &mut FrameWriter) -> Result<(), EncodeError> {
    match op {
        MiscOp::WriteReg {
            reg_offset,
            reg_value,
        } => {
            w.u32(*reg_offset)?;
            w.u32(*reg_value)
        }
        MiscOp::InvGart {
            inv_range_va_start,
            inv_range_size,
        } => {
            w.u64(*inv_range_va_start)?;
            w.u64(*inv_range_size)
        }
        MiscOp::QueryStatus { context_id } => w.u32(*context_id),
        MiscOp::ReadReg {
            reg_offset,
            buffer_addr,
            option,
        } => {
            w.u32(*reg_offset)?;
            w.u64(*buffer_addr)?;
            w.u32(option.bits())
        }
        MiscOp::WaitRegMem {
            op,
            reference,
            mask,
            reg_offset1,
            reg_offset2,
        } => w.u32s(&[op.raw(), *reference, *mask, *reg_offset1, *reg_offset2]),
        MiscOp::SetShaderDebugger(dbg) => {
            w.u64(dbg.process_context_addr)?;
            w.u32(dbg.flags.bits())?;
            w.u32(dbg.spi_gdbg_per_vmid_cntl)?;
            w.u32s(&dbg.tcp_watch_cntl)?;
            w.u32(dbg.trap_en)
        }
        MiscOp::NotifyWorkOnUnmappedQueue { queue_sch_level } => w.u32(queue_sch_level.raw()),
        MiscOp::ChangeConfig {
            option,
            bits,
            tdr_level,
            tdr_delay,
        } => w.u32s(&[option.raw(), bits.bits(), *tdr_level, *tdr_delay]),
        MiscOp::NotifyToUnmapProcesses
        | MiscOp::QueryHungEngineId
        | MiscOp::LaunchCleanerShader
        | MiscOp::SetupMesDbgext => Ok(()),
        MiscOp::Unknown { data, .. } => w.u32s(data),
    }
}

fn read_misc_op(opcode: u32, r: &mut FrameReader<'_>) -> Result<MiscOp, DecodeError> {
    let Some(known) = MiscOpcode::from_raw(opcode) else {
        return Ok(MiscOp::Unknown {
            opcode,
            data: r.raw()?,
        });
    };
    Ok(match known {
        MiscOpcode::WriteReg => MiscOp::WriteReg {
            reg_offset: r.u32()?,
            reg_value: r.u32()?,
        },
        MiscOpcode::InvGart => MiscOp::InvGart {
            inv_range_va_start: r.u64()?,
            inv_range_size: r.u64()?,
        },
        MiscOpcode::QueryStatus => MiscOp::QueryStatus {
            context_id: r.u32()?,
        },
        MiscOpcode::ReadReg => MiscOp::ReadReg {
            reg_offset: r.u32()?,
            buffer_addr: r.u64()?,
            option: ReadRegOption::from_bits(r.u32()?),
        },
        MiscOpcode::WaitRegMem => MiscOp::WaitRegMem {
            op: r.value()?,
            reference: r.u32()?,
            mask: r.u32()?,
            reg_offset1: r.u32()?,
            reg_offset2: r.u32()?,
        },
        MiscOpcode::SetShaderDebugger => MiscOp::SetShaderDebugger(ShaderDebugger {
            process_context_addr: r.u64()?,
            flags: ShaderDebuggerFlags::from_bits(r.u32()?),
            spi_gdbg_per_vmid_cntl: r.u32()?,
            tcp_watch_cntl: r.u32s()?,
            trap_en: r.u32()?,
        }),
        MiscOpcode::NotifyWorkOnUnmappedQueue => MiscOp::NotifyWorkOnUnmappedQueue {
            queue_sch_level: r.value()?,
        },
        MiscOpcode::ChangeConfig => MiscOp::ChangeConfig {
            option: r.value()?,
            bits: ChangeConfigBits::from_bits(r.u32()?),
            tdr_level: r.u32()?,
            tdr_delay: r.u32()?,
        },
        MiscOpcode::NotifyToUnmapProcesses => MiscOp::NotifyToUnmapProcesses,
        MiscOpcode::QueryHungEngineId => MiscOp::QueryHungEngineId,
        MiscOpcode::LaunchCleanerShader => MiscOp::LaunchCleanerShader,
        MiscOpcode::SetupMesDbgext => MiscOp::SetupMesDbgext,
    })
}

impl Wire for MiscCommand {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.op.opcode())?;
        w.status(&self.api_status)?;
        w.union(MISC_DATA_MAX_SIZE_IN_DWORDS, |w| write_misc_op(&self.op, w))?;
        w.u64(self.timestamp)?;
        w.u32(self.doorbell_offset)?;
        w.u32(self.os_fence)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        let opcode = r.u32()?;
        let api_status = r.status()?;
        let op = r.union(MISC_DATA_MAX_SIZE_IN_DWORDS, |r| read_misc_op(opcode, r))?;
        Ok(Self {
            op,
            api_status,
            timestamp: r.u64()?,
            doorbell_offset: r.u32()?,
            os_fence: r.u32()?,
        })
    }
}

impl Wire for UpdateRootPageTable {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u64(self.page_table_base_addr)?;
        w.u64(self.process_context_addr)?;
        w.status(&self.api_status)?;
        w.u64(self.timestamp)?;
        w.u32(self.process_context_array_index)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            page_table_base_addr: r.u64()?,
            process_context_addr: r.u64()?,
            api_status: r.status()?,
            timestamp: r.u64()?,
            process_context_array_index: r.u32()?,
        })
    }
}

impl Wire for AmdLog {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u64(self.p_buffer_memory)?;
        w.u64(self.p_buffer_size_used)?;
        w.status(&self.api_status)?;
        w.u64(self.timestamp)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            p_buffer_memory: r.u64()?,
            p_buffer_size_used: r.u64()?,
            api_status: r.status()?,
            timestamp: r.u64()?,
        })
    }
}

impl Wire for SetSeMode {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.u32(self.new_se_mode.raw())?;
        w.u64(self.cpg_ctxt_sync_fence_addr)?;
        w.u32(self.cpg_ctxt_sync_fence_value)?;
        w.u32(self.flags.bits())?;
        w.status(&self.api_status)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            new_se_mode: r.value()?,
            cpg_ctxt_sync_fence_addr: r.u64()?,
            cpg_ctxt_sync_fence_value: r.u32()?,
            flags: SeModeFlags::from_bits(r.u32()?),
            api_status: r.status()?,
        })
    }
}

impl Wire for SetGangSubmit {
    fn write(&self, w: &mut FrameWriter) -> Result<(), EncodeError> {
        w.status(&self.api_status)?;
        w.u64(self.gang_context_addr)?;
        w.u64(self.slave_gang_context_addr)?;
        w.u32(self.gang_context_array_index)?;
        w.u32(self.slave_gang_context_array_index)
    }

    fn read(r: &mut FrameReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            api_status: r.status()?,
            gang_context_addr: r.u64()?,
            slave_gang_context_addr: r.u64()?,
            gang_context_array_index: r.u32()?,
            slave_gang_context_array_index: r.u32()?,
        })
    }
}
