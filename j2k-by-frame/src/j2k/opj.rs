//! Owned wrappers around the OpenJPEG objects used for one encode.
//!
//! Every object is released on drop, so an early return from any step of
//! the encode (including a failed container allocation) frees whatever
//! was already created.

use super::{CompressorConfig, ProgressionOrder, CODESTREAM_COMMENT};
use crate::error::{Error, Result};
use log::{error, warn};
use openjpeg_sys as sys;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::{c_char, c_void};
use std::ptr::{self, NonNull};
use std::slice;

const STREAM_CHUNK_SIZE: usize = 1 << 20;

/// The image container handed to the compressor.
pub(super) struct Image {
    ptr: NonNull<sys::opj_image_t>,
    samples: usize,
}

impl Image {
    pub(super) fn new(config: &CompressorConfig) -> Result<Self> {
        let mut params: Vec<sys::opj_image_cmptparm_t> = (0..config.components)
            .map(|_| {
                // All-zero is a valid starting point for this plain C struct.
                let mut p: sys::opj_image_cmptparm_t = unsafe { std::mem::zeroed() };
                p.dx = 1;
                p.dy = 1;
                p.w = config.size.width;
                p.h = config.size.height;
                p.x0 = 0;
                p.y0 = 0;
                p.prec = config.bit_depth;
                p.sgnd = 0;
                p
            })
            .collect();

        let raw = unsafe {
            sys::opj_image_create(
                config.components,
                params.as_mut_ptr(),
                sys::COLOR_SPACE::OPJ_CLRSPC_SRGB,
            )
        };
        let ptr = NonNull::new(raw).ok_or(Error::Container)?;
        let image = Image {
            ptr,
            samples: config.size.area(),
        };

        unsafe {
            let raw = image.ptr.as_ptr();
            (*raw).x0 = 0;
            (*raw).y0 = 0;
            (*raw).x1 = config.size.width;
            (*raw).y1 = config.size.height;
        }
        Ok(image)
    }

    pub(super) fn component_mut(&mut self, index: usize) -> &mut [i32] {
        unsafe {
            let raw = self.ptr.as_ptr();
            assert!(index < (*raw).numcomps as usize);
            let comp = (*raw).comps.add(index);
            slice::from_raw_parts_mut((*comp).data, self.samples)
        }
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe { sys::opj_image_destroy(self.ptr.as_ptr()) }
    }
}

struct Codec {
    ptr: NonNull<sys::opj_codec_t>,
}

impl Codec {
    fn new_j2k_compressor() -> Result<Self> {
        let raw = unsafe { sys::opj_create_compress(sys::CODEC_FORMAT::OPJ_CODEC_J2K) };
        let ptr = NonNull::new(raw).ok_or_else(|| Error::encode("could not create compressor"))?;
        unsafe {
            sys::opj_set_warning_handler(ptr.as_ptr(), Some(log_warning), ptr::null_mut());
            sys::opj_set_error_handler(ptr.as_ptr(), Some(log_error), ptr::null_mut());
        }
        Ok(Codec { ptr })
    }
}

impl Drop for Codec {
    fn drop(&mut self) {
        unsafe { sys::opj_destroy_codec(self.ptr.as_ptr()) }
    }
}

unsafe extern "C" fn log_warning(msg: *const c_char, _client_data: *mut c_void) {
    if !msg.is_null() {
        warn!("openjpeg: {}", CStr::from_ptr(msg).to_string_lossy().trim_end());
    }
}

unsafe extern "C" fn log_error(msg: *const c_char, _client_data: *mut c_void) {
    if !msg.is_null() {
        error!("openjpeg: {}", CStr::from_ptr(msg).to_string_lossy().trim_end());
    }
}

/// Seekable in-memory destination for the codestream. Cinema profiles
/// seek back to fill in tile-part lengths, so plain appending is not enough.
#[derive(Default)]
struct MemorySink {
    data: Vec<u8>,
    position: usize,
}

impl MemorySink {
    fn write(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }
}

struct OutputStream<'a> {
    ptr: NonNull<sys::opj_stream_t>,
    _sink: PhantomData<&'a mut MemorySink>,
}

impl<'a> OutputStream<'a> {
    fn new(sink: &'a mut MemorySink) -> Result<Self> {
        let raw = unsafe { sys::opj_stream_create(STREAM_CHUNK_SIZE, 0) };
        let ptr = NonNull::new(raw).ok_or_else(|| Error::encode("could not create output stream"))?;
        unsafe {
            sys::opj_stream_set_user_data(
                ptr.as_ptr(),
                sink as *mut MemorySink as *mut c_void,
                None,
            );
            sys::opj_stream_set_write_function(ptr.as_ptr(), Some(sink_write));
            sys::opj_stream_set_skip_function(ptr.as_ptr(), Some(sink_skip));
            sys::opj_stream_set_seek_function(ptr.as_ptr(), Some(sink_seek));
        }
        Ok(OutputStream {
            ptr,
            _sink: PhantomData,
        })
    }
}

impl Drop for OutputStream<'_> {
    fn drop(&mut self) {
        unsafe { sys::opj_stream_destroy(self.ptr.as_ptr()) }
    }
}

unsafe extern "C" fn sink_write(buffer: *mut c_void, len: usize, user_data: *mut c_void) -> usize {
    let sink = &mut *(user_data as *mut MemorySink);
    sink.write(slice::from_raw_parts(buffer as *const u8, len));
    len
}

unsafe extern "C" fn sink_skip(offset: i64, user_data: *mut c_void) -> i64 {
    let sink = &mut *(user_data as *mut MemorySink);
    let target = sink.position as i64 + offset;
    if target < 0 {
        return -1;
    }
    sink.position = target as usize;
    offset
}

unsafe extern "C" fn sink_seek(offset: i64, user_data: *mut c_void) -> i32 {
    let sink = &mut *(user_data as *mut MemorySink);
    if offset < 0 {
        return 0;
    }
    sink.position = offset as usize;
    1
}

fn progression_order(order: ProgressionOrder) -> sys::PROG_ORDER {
    match order {
        ProgressionOrder::Lrcp => sys::PROG_ORDER::OPJ_LRCP,
        ProgressionOrder::Rlcp => sys::PROG_ORDER::OPJ_RLCP,
        ProgressionOrder::Rpcl => sys::PROG_ORDER::OPJ_RPCL,
        ProgressionOrder::Pcrl => sys::PROG_ORDER::OPJ_PCRL,
        ProgressionOrder::Cprl => sys::PROG_ORDER::OPJ_CPRL,
    }
}

/// Run the compressor over `image`, returning the finished codestream.
pub(super) fn encode(config: &CompressorConfig, image: &mut Image) -> Result<Vec<u8>> {
    let comment = CString::new(CODESTREAM_COMMENT).map_err(|e| Error::encode(e.to_string()))?;

    let mut parameters: sys::opj_cparameters_t = unsafe { std::mem::zeroed() };
    unsafe { sys::opj_set_default_encoder_parameters(&mut parameters) };

    // One tile covering the whole picture, anchored at the origin
    parameters.tile_size_on = 0;
    parameters.cp_tdx = 1;
    parameters.cp_tdy = 1;
    parameters.cp_tx0 = 0;
    parameters.cp_ty0 = 0;
    parameters.image_offset_x0 = 0;
    parameters.image_offset_y0 = 0;

    // Tile parts split by component
    parameters.tp_flag = b'C' as c_char;
    parameters.tp_on = 1;

    parameters.cblockw_init = config.codeblock_width;
    parameters.cblockh_init = config.codeblock_height;
    parameters.csty |= 0x01;
    parameters.prog_order = progression_order(config.progression_order);
    parameters.roi_compno = -1;
    parameters.subsampling_dx = 1;
    parameters.subsampling_dy = 1;
    parameters.irreversible = config.irreversible as i32;

    parameters.tcp_numlayers = config.quality_layers;
    parameters.tcp_rates[0] = config.rate;
    parameters.cp_disto_alloc = 1;
    parameters.rsiz = sys::OPJ_PROFILE_CINEMA_2K as u16;
    parameters.cp_comment = comment.as_ptr() as *mut c_char;
    parameters.tcp_mct = config.multi_component_transform as c_char;
    parameters.max_comp_size = config.max_comp_size;
    parameters.max_cs_size = config.max_cs_len;

    let codec = Codec::new_j2k_compressor()?;
    if unsafe { sys::opj_setup_encoder(codec.ptr.as_ptr(), &mut parameters, image.ptr.as_ptr()) }
        == 0
    {
        return Err(Error::encode("compressor rejected the encoding parameters"));
    }

    let mut sink = MemorySink::default();
    {
        let stream = OutputStream::new(&mut sink)?;
        let ok = unsafe {
            sys::opj_start_compress(codec.ptr.as_ptr(), image.ptr.as_ptr(), stream.ptr.as_ptr()) != 0
                && sys::opj_encode(codec.ptr.as_ptr(), stream.ptr.as_ptr()) != 0
                && sys::opj_end_compress(codec.ptr.as_ptr(), stream.ptr.as_ptr()) != 0
        };
        if !ok {
            return Err(Error::encode("jpeg2000 encoding failed"));
        }
    }

    Ok(sink.data)
}
