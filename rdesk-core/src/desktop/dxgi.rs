//! DXGI Desktop Duplication capturer for Windows.
//!
//! Every DXGI output attached to the desktop becomes a [`Screen`]. The
//! full-desktop selection duplicates all outputs and composes them into
//! one frame spanning their union.
//!
//! Failure classification:
//! - `DXGI_ERROR_WAIT_TIMEOUT`: no new frame yet. An output that times
//!   out keeps its last image in the composite; the cycle is temporary
//!   only when no output has anything new.
//! - `DXGI_ERROR_ACCESS_LOST`: mode change, secure desktop or session
//!   switch; the duplication is rebuilt on the next cycle, temporary.
//! - anything else (device removed, output gone on rebuild): permanent.
//!
//! # Safety
//!
//! All unsafe FFI calls are confined to this module.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::core::Interface;

use crate::desktop::capturer::{
    FULL_DESKTOP_SCREEN_ID, Screen, ScreenCapturer, ScreenId, ScreenList,
};
use crate::desktop::composite::{OutputUpdate, composite_status};
use crate::desktop::diff::{self, DEFAULT_BLOCK_SIZE};
use crate::desktop::frame::{Frame, PixelFormat};
use crate::desktop::frame_queue::FrameQueue;
use crate::desktop::geometry::{Point, Rect};
use crate::desktop::shared_memory::SharedMemoryFactory;
use crate::error::{CaptureError, DeskError};

/// How long `AcquireNextFrame` may block per output.
const ACQUIRE_TIMEOUT_MS: u32 = 50;

struct Output {
    title: String,
    rect: Rect,
    output: IDXGIOutput1,
}

/// One duplicated output plus its CPU-readable staging copy.
struct Duplication {
    rect: Rect,
    duplication: IDXGIOutputDuplication,
    staging: ID3D11Texture2D,
    /// The staging texture holds at least one acquired image.
    has_content: bool,
}

/// Desktop Duplication backed [`ScreenCapturer`].
pub struct DxgiScreenCapturer {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    selected: ScreenId,
    /// Built lazily; dropped on access loss and on selection change.
    duplications: Vec<Duplication>,
    queue: FrameQueue<Frame>,
    shared_memory: Option<Arc<dyn SharedMemoryFactory>>,
}

// SAFETY: the COM objects are only touched through `&mut self` by the
// single capture thread that owns the capturer.
unsafe impl Send for DxgiScreenCapturer {}

fn other(context: &str, e: windows::core::Error) -> DeskError {
    DeskError::Other(format!("{context} failed: {e}"))
}

fn rect_from(r: RECT) -> Rect {
    Rect::new(r.left, r.top, (r.right - r.left) as u32, (r.bottom - r.top) as u32)
}

impl DxgiScreenCapturer {
    /// Create a D3D11 device on the default hardware adapter.
    pub fn new() -> Result<Self, DeskError> {
        let mut device = None;
        let mut context = None;
        unsafe {
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                None,
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                None,
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .map_err(|e| other("D3D11CreateDevice", e))?;
        }

        let device = device.ok_or_else(|| DeskError::Other("D3D11 device is None".into()))?;
        let context = context.ok_or_else(|| DeskError::Other("D3D11 context is None".into()))?;

        Ok(Self {
            device,
            context,
            selected: FULL_DESKTOP_SCREEN_ID,
            duplications: Vec::new(),
            queue: FrameQueue::new(),
            shared_memory: None,
        })
    }

    /// Outputs attached to the desktop, in adapter order.
    fn outputs(&self) -> Result<Vec<Output>, DeskError> {
        let dxgi_device: IDXGIDevice = self
            .device
            .cast()
            .map_err(|e| other("cast to IDXGIDevice", e))?;
        let adapter = unsafe { dxgi_device.GetAdapter() }.map_err(|e| other("GetAdapter", e))?;

        let mut outputs = Vec::new();
        let mut index = 0;
        while let Ok(output) = unsafe { adapter.EnumOutputs(index) } {
            index += 1;
            let desc = unsafe { output.GetDesc() }.map_err(|e| other("IDXGIOutput::GetDesc", e))?;
            if !desc.AttachedToDesktop.as_bool() {
                continue;
            }
            let name_len = desc.DeviceName.iter().position(|&c| c == 0).unwrap_or(desc.DeviceName.len());
            let output: IDXGIOutput1 = output
                .cast()
                .map_err(|e| other("cast to IDXGIOutput1", e))?;
            outputs.push(Output {
                title: String::from_utf16_lossy(&desc.DeviceName[..name_len]),
                rect: rect_from(desc.DesktopCoordinates),
                output,
            });
        }
        Ok(outputs)
    }

    fn duplicate(&self, output: &Output) -> Result<Duplication, DeskError> {
        let duplication = unsafe { output.output.DuplicateOutput(&self.device) }
            .map_err(|e| other("DuplicateOutput", e))?;

        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: output.rect.width,
            Height: output.rect.height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };
        let mut staging = None;
        unsafe {
            self.device
                .CreateTexture2D(&staging_desc, None, Some(&mut staging))
                .map_err(|e| other("CreateTexture2D (staging)", e))?;
        }
        let staging = staging.ok_or_else(|| DeskError::Other("staging texture is None".into()))?;

        Ok(Duplication {
            rect: output.rect,
            duplication,
            staging,
            has_content: false,
        })
    }

    fn ensure_duplications(&mut self) -> Result<(), CaptureError> {
        if !self.duplications.is_empty() {
            return Ok(());
        }

        let outputs = self
            .outputs()
            .map_err(|e| CaptureError::permanent(e.to_string()))?;
        let targets: Vec<&Output> = outputs
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                self.selected == FULL_DESKTOP_SCREEN_ID || *index as ScreenId == self.selected
            })
            .map(|(_, output)| output)
            .collect();

        if targets.is_empty() {
            // Display topology is changing; the selection is revisited next cycle.
            self.selected = FULL_DESKTOP_SCREEN_ID;
            return Err(CaptureError::temporary("selected output is not attached"));
        }

        let mut duplications = Vec::with_capacity(targets.len());
        for output in targets {
            duplications.push(
                self.duplicate(output)
                    .map_err(|e| CaptureError::temporary(e.to_string()))?,
            );
        }
        debug!(outputs = duplications.len(), "desktop duplication ready");
        self.duplications = duplications;
        Ok(())
    }

    /// Copy the next image of `dup` into its staging texture. A timeout
    /// leaves the previous image in place.
    fn acquire(context: &ID3D11DeviceContext, dup: &mut Duplication) -> Result<OutputUpdate, CaptureError> {
        let mut frame_info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource = None;

        match unsafe {
            dup.duplication
                .AcquireNextFrame(ACQUIRE_TIMEOUT_MS, &mut frame_info, &mut resource)
        } {
            Ok(()) => {}
            Err(e) if e.code() == DXGI_ERROR_WAIT_TIMEOUT => return Ok(OutputUpdate::Unchanged),
            Err(e) if e.code() == DXGI_ERROR_ACCESS_LOST => {
                return Err(CaptureError::temporary(format!("desktop access lost: {e}")));
            }
            Err(e) => return Err(CaptureError::permanent(format!("AcquireNextFrame failed: {e}"))),
        }

        let resource = match resource {
            Some(resource) => resource,
            None => {
                let _ = unsafe { dup.duplication.ReleaseFrame() };
                return Err(CaptureError::temporary("acquired resource is None"));
            }
        };
        let texture: ID3D11Texture2D = resource.cast().map_err(|e| {
            let _ = unsafe { dup.duplication.ReleaseFrame() };
            CaptureError::permanent(format!("cast to ID3D11Texture2D failed: {e}"))
        })?;

        unsafe { context.CopyResource(&dup.staging, &texture) };
        let _ = unsafe { dup.duplication.ReleaseFrame() };
        dup.has_content = true;
        Ok(OutputUpdate::Fresh)
    }

    /// Copy the staging image of `dup` into `frame` at the output's offset
    /// from `origin`.
    fn blit(
        context: &ID3D11DeviceContext,
        dup: &Duplication,
        frame: &mut Frame,
        origin: Point,
    ) -> Result<(), CaptureError> {
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe { context.Map(&dup.staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped)) }
            .map_err(|e| CaptureError::permanent(format!("Map failed: {e}")))?;

        let src_pitch = mapped.RowPitch as usize;
        let rows = dup.rect.height as usize;
        let src = unsafe { std::slice::from_raw_parts(mapped.pData as *const u8, src_pitch * rows) };

        let local = dup.rect.relative_to(origin);
        let bpp = frame.format().bytes_per_pixel();
        let row_bytes = dup.rect.width as usize * bpp;
        let dst_left = local.x as usize * bpp;
        for y in 0..rows {
            let dst = frame.row_mut(local.y as u32 + y as u32);
            dst[dst_left..dst_left + row_bytes]
                .copy_from_slice(&src[y * src_pitch..y * src_pitch + row_bytes]);
        }

        unsafe { context.Unmap(&dup.staging, 0) };
        Ok(())
    }
}

impl ScreenCapturer for DxgiScreenCapturer {
    fn screen_count(&self) -> usize {
        self.outputs().map(|outputs| outputs.len()).unwrap_or(0)
    }

    fn screen_list(&self) -> Result<ScreenList, DeskError> {
        let outputs = self
            .outputs()
            .map_err(|e| DeskError::Enumeration(e.to_string()))?;
        Ok(outputs
            .into_iter()
            .enumerate()
            .map(|(index, output)| Screen::new(index as ScreenId, output.title))
            .collect())
    }

    fn select_screen(&mut self, screen_id: ScreenId) -> Result<(), DeskError> {
        if screen_id != FULL_DESKTOP_SCREEN_ID {
            let count = self.screen_count();
            if screen_id < 0 || screen_id as usize >= count {
                return Err(DeskError::InvalidScreen(screen_id));
            }
        }
        if screen_id != self.selected {
            self.duplications.clear();
        }
        self.selected = screen_id;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<&Frame, CaptureError> {
        self.ensure_duplications()?;

        let bounds = self
            .duplications
            .iter()
            .fold(Rect::default(), |acc, d| acc.union(&d.rect));

        self.queue.move_to_next_frame();
        let reusable = matches!(self.queue.current_frame(), Some(f) if f.size() == bounds.size());
        if !reusable {
            let frame = Frame::allocate(bounds.size(), PixelFormat::Bgra8, self.shared_memory.as_deref())
                .map_err(|e| CaptureError::permanent(e.to_string()))?;
            self.queue.replace_current_frame(frame);
        }

        let Some(frame) = self.queue.current_frame_mut() else {
            return Err(CaptureError::temporary("frame slot is empty"));
        };

        let mut updates = Vec::with_capacity(self.duplications.len());
        let mut outcome = Ok(());
        for dup in &mut self.duplications {
            match Self::acquire(&self.context, dup) {
                Ok(update) => updates.push(update),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        let outcome = outcome.and_then(|()| composite_status(&updates)).and_then(|()| {
            // The slot is two cycles old, so every output with an image is
            // redrawn, idle ones included.
            for dup in self.duplications.iter().filter(|d| d.has_content) {
                Self::blit(&self.context, dup, frame, bounds.top_left())?;
            }
            Ok(())
        });
        frame.set_top_left(bounds.top_left());
        frame.set_capture_time(Instant::now());

        if let Err(e) = outcome {
            // Undo the rotation so the last good frame stays current.
            self.queue.move_to_next_frame();
            if let CaptureError::Temporary(reason) = &e {
                if reason.starts_with("desktop access lost") {
                    warn!("{reason}; rebuilding duplication");
                    self.duplications.clear();
                }
            }
            return Err(e);
        }

        let region = match self.queue.current_frame() {
            Some(current) => {
                diff::changed_blocks(current, self.queue.previous_frame(), DEFAULT_BLOCK_SIZE)
            }
            None => Vec::new(),
        };
        let frame = self
            .queue
            .current_frame_mut()
            .ok_or_else(|| CaptureError::temporary("frame slot is empty"))?;
        frame.set_updated_region(region);
        Ok(frame)
    }

    fn reset(&mut self) {
        self.queue.reset();
        self.duplications.clear();
    }

    fn set_shared_memory_factory(&mut self, factory: Option<Arc<dyn SharedMemoryFactory>>) {
        // Buffered frames belong to the old placement.
        self.queue.reset();
        self.shared_memory = factory;
    }

    fn shared_memory_factory(&self) -> Option<Arc<dyn SharedMemoryFactory>> {
        self.shared_memory.clone()
    }
}
