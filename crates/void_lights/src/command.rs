//! GPU Command Stream
//!
//! Append-only list of fixed-size commands consumed by the rendering backend.
//! Each command is a kind code followed by a flat `f32` payload, so the whole
//! list can be uploaded as one buffer.
//!
//! # Layout
//!
//! | entry | contents                     |
//! |-------|------------------------------|
//! | 0     | command kind code            |
//! | 1..N  | payload in push order        |
//!
//! Integers are stored as exact float values and are safe up to 2^24.

use alloc::vec::Vec;
use glam::Vec3;

/// Number of `f32` entries per command, including the kind code
pub const GPU_COMMAND_ENTRIES: usize = 32;

/// Payload capacity of a single command
pub const GPU_COMMAND_PAYLOAD: usize = GPU_COMMAND_ENTRIES - 1;

/// Command kind codes
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Store (create or overwrite) the light in the slot carried by the payload
    StoreLight = 1,
    /// Remove the light in the slot carried by the payload
    RemoveLight = 2,
}

impl CommandKind {
    /// Wire code
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// A single command with its payload
#[derive(Clone, Debug, PartialEq)]
pub struct GpuCommand {
    kind: CommandKind,
    payload: [f32; GPU_COMMAND_PAYLOAD],
    len: usize,
}

impl GpuCommand {
    /// Create an empty command
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            payload: [0.0; GPU_COMMAND_PAYLOAD],
            len: 0,
        }
    }

    /// Command kind
    #[inline]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Number of payload entries written
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no payload has been written
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Written payload entries
    pub fn payload(&self) -> &[f32] {
        &self.payload[..self.len]
    }

    /// Append an integer
    pub fn push_int(&mut self, value: i32) {
        self.push_float(value as f32);
    }

    /// Append a float
    pub fn push_float(&mut self, value: f32) {
        if self.len >= GPU_COMMAND_PAYLOAD {
            log::error!(
                "{:?} command payload is full ({} entries), dropping value",
                self.kind,
                GPU_COMMAND_PAYLOAD
            );
            return;
        }
        self.payload[self.len] = value;
        self.len += 1;
    }

    /// Append a 3-component vector
    pub fn push_vec3(&mut self, value: Vec3) {
        self.push_float(value.x);
        self.push_float(value.y);
        self.push_float(value.z);
    }

    /// Read a payload entry as float
    pub fn read_float(&self, index: usize) -> Option<f32> {
        self.payload().get(index).copied()
    }

    /// Read a payload entry as integer
    pub fn read_int(&self, index: usize) -> Option<i32> {
        self.read_float(index).map(|v| v as i32)
    }

    /// Read three payload entries as a vector
    pub fn read_vec3(&self, index: usize) -> Option<Vec3> {
        Some(Vec3::new(
            self.read_float(index)?,
            self.read_float(index + 1)?,
            self.read_float(index + 2)?,
        ))
    }

    /// GPU layout: kind code followed by the zero-padded payload
    pub fn to_gpu(&self) -> [f32; GPU_COMMAND_ENTRIES] {
        let mut data = [0.0; GPU_COMMAND_ENTRIES];
        data[0] = self.kind.code() as f32;
        data[1..].copy_from_slice(&self.payload);
        data
    }
}

/// Append-only command list
///
/// Commands are never edited once added. The consumer takes them with
/// [`CommandList::drain`].
#[derive(Clone, Debug, Default)]
pub struct CommandList {
    commands: Vec<GpuCommand>,
    total_added: u64,
}

impl CommandList {
    /// Create an empty command list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    pub fn add_command(&mut self, command: GpuCommand) {
        self.commands.push(command);
        self.total_added += 1;
    }

    /// Number of pending commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if there are no pending commands
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Pending commands in append order
    pub fn iter(&self) -> impl Iterator<Item = &GpuCommand> {
        self.commands.iter()
    }

    /// Pending commands of one kind
    pub fn iter_kind(&self, kind: CommandKind) -> impl Iterator<Item = &GpuCommand> {
        self.commands.iter().filter(move |cmd| cmd.kind() == kind)
    }

    /// Commands ever added, including drained ones
    pub fn total_added(&self) -> u64 {
        self.total_added
    }

    /// Take all pending commands
    pub fn drain(&mut self) -> Vec<GpuCommand> {
        core::mem::take(&mut self.commands)
    }

    /// Append all pending commands to an upload buffer in GPU layout
    pub fn write_to(&self, buffer: &mut Vec<[f32; GPU_COMMAND_ENTRIES]>) {
        buffer.extend(self.commands.iter().map(GpuCommand::to_gpu));
    }

    /// Pending commands as bytes for GPU upload
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.commands.len());
        self.write_to(&mut data);
        bytemuck::cast_slice(&data).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_push_and_read() {
        let mut cmd = GpuCommand::new(CommandKind::StoreLight);
        cmd.push_int(7);
        cmd.push_float(0.5);
        cmd.push_vec3(Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(cmd.len(), 5);
        assert_eq!(cmd.read_int(0), Some(7));
        assert_eq!(cmd.read_float(1), Some(0.5));
        assert_eq!(cmd.read_vec3(2), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(cmd.read_float(5), None);
    }

    #[test]
    fn test_command_overflow_dropped() {
        let mut cmd = GpuCommand::new(CommandKind::StoreLight);
        for i in 0..(GPU_COMMAND_PAYLOAD as i32 + 4) {
            cmd.push_int(i);
        }
        assert_eq!(cmd.len(), GPU_COMMAND_PAYLOAD);
        assert_eq!(cmd.read_int(GPU_COMMAND_PAYLOAD - 1), Some(GPU_COMMAND_PAYLOAD as i32 - 1));
    }

    #[test]
    fn test_gpu_layout() {
        let mut cmd = GpuCommand::new(CommandKind::RemoveLight);
        cmd.push_int(3);

        let data = cmd.to_gpu();
        assert_eq!(data[0], 2.0);
        assert_eq!(data[1], 3.0);
        assert!(data[2..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_command_list_drain() {
        let mut list = CommandList::new();
        list.add_command(GpuCommand::new(CommandKind::StoreLight));
        list.add_command(GpuCommand::new(CommandKind::RemoveLight));

        assert_eq!(list.len(), 2);
        assert_eq!(list.iter_kind(CommandKind::RemoveLight).count(), 1);

        let drained = list.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind(), CommandKind::StoreLight);
        assert!(list.is_empty());
        assert_eq!(list.total_added(), 2);
    }

    #[test]
    fn test_command_list_bytes() {
        let mut list = CommandList::new();
        list.add_command(GpuCommand::new(CommandKind::StoreLight));
        list.add_command(GpuCommand::new(CommandKind::StoreLight));

        let bytes = list.to_bytes();
        assert_eq!(bytes.len(), 2 * GPU_COMMAND_ENTRIES * 4);
    }
}
