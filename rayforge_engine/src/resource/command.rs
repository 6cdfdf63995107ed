/// Single-use command scope
///
/// Acquire a command buffer from the transient pool, begin it with
/// one-time-submit, record, then end, submit and block until the queue is
/// idle. The command buffer is freed on every exit path.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    AccelerationStructureHandle, AccelerationStructureInfo, BufferCopy, CommandBufferHandle,
    GraphicsDevice, ImageBarrier, ImageLayout, MemoryBarrier, PipelineStageFlags,
};
use crate::resource::{Buffer, Image};

/// Recording scope of a one-time-submit command buffer
///
/// Dropping a scope that was never submitted frees the command buffer
/// without executing anything.
pub struct SingleUseCommand {
    device: Arc<dyn GraphicsDevice>,
    handle: CommandBufferHandle,
}

impl SingleUseCommand {
    /// Allocate and begin a command buffer
    pub(crate) fn begin(device: Arc<dyn GraphicsDevice>) -> Result<Self> {
        let handle = device.allocate_command_buffer()?;
        let command = Self { device, handle };
        command.device.begin_command_buffer(handle)?;
        Ok(command)
    }

    pub fn handle(&self) -> CommandBufferHandle {
        self.handle
    }

    /// Record a buffer-to-buffer copy
    pub fn copy_buffer(&self, src: &Buffer, dst: &Buffer, region: BufferCopy) {
        self.device.cmd_copy_buffer(self.handle, src.handle(), dst.handle(), region);
    }

    /// Record a copy of tightly packed texels into the whole image
    ///
    /// The image must already be in the TransferDst layout.
    pub fn copy_buffer_to_image(&self, src: &Buffer, dst: &Image) {
        self.device.cmd_copy_buffer_to_image(
            self.handle,
            src.handle(),
            dst.handle(),
            ImageLayout::TransferDst,
            dst.extent(),
        );
    }

    pub fn pipeline_barrier(
        &self,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        memory_barriers: &[MemoryBarrier],
        image_barriers: &[ImageBarrier],
    ) {
        self.device
            .cmd_pipeline_barrier(self.handle, src_stage, dst_stage, memory_barriers, image_barriers);
    }

    /// Record a full acceleration-structure build
    pub fn build_acceleration_structure(
        &self,
        info: &AccelerationStructureInfo,
        instance_buffer: Option<&Buffer>,
        dst: AccelerationStructureHandle,
        scratch: &Buffer,
    ) {
        self.device.cmd_build_acceleration_structure(
            self.handle,
            info,
            instance_buffer.map(|buffer| buffer.handle()),
            dst,
            scratch.handle(),
        );
    }

    /// End recording, submit and wait for the queue to be idle
    pub fn submit(self) -> Result<()> {
        self.device.end_command_buffer(self.handle)?;
        self.device.submit_and_wait_idle(self.handle)
    }
}

impl Drop for SingleUseCommand {
    fn drop(&mut self) {
        self.device.free_command_buffer(self.handle);
    }
}
