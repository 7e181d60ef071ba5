//! The top-level decode pipeline.
//!
//! One decode runs: input sniff (and PE mapping when needed), table
//! location, descriptor walk, immediate dispatch of well-known sections,
//! deferred resolution of generic sections smallest-first, and finally
//! client-INI decryption once the public key is available. Embedded
//! modules are themselves full containers and recurse through the same
//! pipeline, depth-bounded.
//!
//! Failure policy follows the section layering: structural failures
//! (no table, truncated chain) abort the decode; anything scoped to one
//! section degrades to a diagnostic so siblings keep processing, and a
//! failed nested module is recorded under its `DLL_n` key.

use crate::bytes::{find_subslice, read_u32_le};
use crate::ciphers::PublicKeyHandle;
use crate::error::{ExtractError, Result};
use crate::report::{ConfigReport, ConfigValue, DecodeOutput, Diagnostic};
use crate::sections::{DeferredSection, SectionKind};
use crate::walker::{DescriptorWalker, SectionDescriptor};
use crate::{depack, image, ini, locator, pubkey};

/// Payload size separating embedded modules from the client-INI blob on
/// the key-protected path.
const MODULE_SIZE_THRESHOLD: usize = 0x500;

/// Magic of a stripped-module container.
const MODULE_MAGIC: &[u8; 2] = b"PX";

/// Marker preceding the packed executable inside a decrypted module
/// section.
const MODULE_LZ_MARKER: &[u8] = b"M8Z";

/// Defensive bound on module nesting; the format itself declares none.
const MAX_MODULE_DEPTH: usize = 8;

/// Table header length: declared length word, 2-byte marker, 2 spare.
const TABLE_HEADER_LEN: usize = 8;

/// Collaborator fingerprinting the host binary's version string.
///
/// Version identification is outside the container format; when a
/// fingerprinter is attached its finding is stored under `VER`.
pub trait VersionFingerprint {
    /// Identifies the sample version from the flat image, if possible.
    fn identify(&self, image: &[u8]) -> Option<String>;
}

/// The configuration decoder.
///
/// Stateless across decodes; all per-decode state lives on the stack of
/// `decode`, so one instance may serve many samples.
#[derive(Default)]
pub struct Decoder {
    fingerprint: Option<Box<dyn VersionFingerprint>>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a version fingerprinting collaborator.
    pub fn with_fingerprint(mut self, fingerprint: Box<dyn VersionFingerprint>) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// Decodes a configuration container from raw sample bytes.
    ///
    /// # Arguments
    /// * `data` - A flat image, a disk-layout PE, or a stripped module.
    ///
    /// # Returns
    /// The reassembled configuration plus the diagnostics collected along
    /// the way, nested modules included.
    ///
    /// # Errors
    /// Structural failures only: unparseable PE, no section table, or a
    /// truncated descriptor chain.
    pub fn decode(&self, data: &[u8]) -> Result<DecodeOutput> {
        let mut diagnostics = Vec::new();
        let config = self.decode_at_depth(data, 0, &mut diagnostics)?;
        Ok(DecodeOutput {
            config,
            diagnostics,
        })
    }

    fn decode_at_depth(
        &self,
        data: &[u8],
        depth: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<ConfigReport> {
        if depth > MAX_MODULE_DEPTH {
            return Err(ExtractError::DepthExceeded { depth });
        }

        let mapped;
        let mut image_bytes: &[u8] = if image::looks_like_unmapped_pe(data) {
            mapped = image::map_virtual_layout(data)?;
            &mapped
        } else {
            data
        };

        // Locate the table; the mangled layout additionally rebuilds the
        // image the section offsets resolve against.
        let rebuilt;
        let table: Vec<u8> = match locator::find_xor_table(image_bytes) {
            Some(table) => table.to_vec(),
            None if image_bytes.starts_with(locator::MANGLED_MAGIC) => {
                log::info!("mangled module layout detected");
                let table = locator::mangled_table(image_bytes)
                    .ok_or_else(|| {
                        ExtractError::format_error("mangled image lacks its table marker")
                    })?
                    .to_vec();
                match locator::rebuild_mangled_image(image_bytes) {
                    Some(flat) => {
                        rebuilt = flat;
                        image_bytes = &rebuilt;
                    }
                    None => diagnostics.push(Diagnostic::new(
                        "locator",
                        "mangled image repair failed; resolving offsets against raw bytes",
                    )),
                }
                table
            }
            None => return Err(ExtractError::format_error("section table not found")),
        };

        let mut report = ConfigReport::default();

        if let Some(fingerprint) = &self.fingerprint {
            if let Some(version) = fingerprint.identify(image_bytes) {
                report.insert("VER", ConfigValue::Text(version));
            }
        }

        let marker = table.get(4..6).ok_or_else(|| {
            ExtractError::format_error("table blob shorter than its header")
        })?;
        report.insert("CONF_VAL", ConfigValue::Blob(marker.to_vec()));

        // The zero-run split strips the chain's trailing sentinel, so pad
        // the walk with one.
        let mut chain = table.get(TABLE_HEADER_LEN..).unwrap_or_default().to_vec();
        chain.extend_from_slice(&[0u8; 4]);

        let mut key: Option<PublicKeyHandle> = None;
        let mut client_ini: Option<Vec<u8>> = None;
        let mut deferred: Vec<DeferredSection> = Vec::new();

        for descriptor in DescriptorWalker::new(&chain) {
            let descriptor = descriptor?;
            let payload = match slice_section(image_bytes, &descriptor) {
                Ok(payload) => payload,
                Err(error) => {
                    diagnostics.push(Diagnostic::new(
                        format!("{:#010x}", descriptor.crc_hash),
                        error.to_string(),
                    ));
                    continue;
                }
            };
            log::debug!(
                "section {:#010x}: offset {:#x}, length {:#x}, compressed {}",
                descriptor.crc_hash,
                descriptor.offset,
                descriptor.length,
                descriptor.decompress
            );

            match SectionKind::from_crc(descriptor.crc_hash) {
                Some(SectionKind::PublicKey) => match pubkey::parse_compressed_key(payload) {
                    Ok(handle) => {
                        log::info!("public key resolved from joiner section");
                        key = Some(handle);
                    }
                    Err(error) => diagnostics.push(Diagnostic::new(
                        SectionKind::PublicKey.name(),
                        error.to_string(),
                    )),
                },
                Some(SectionKind::ClientIni) => client_ini = Some(payload.to_vec()),
                Some(SectionKind::WordList) => match depack::decompress(payload) {
                    Ok(words) => report.insert("WORD_LIST", ConfigValue::Blob(words)),
                    Err(error) => diagnostics.push(Diagnostic::new(
                        SectionKind::WordList.name(),
                        error.to_string(),
                    )),
                },
                Some(kind @ (SectionKind::InstallIni | SectionKind::Client64)) => {
                    diagnostics
                        .push(Diagnostic::new(kind.name(), "recognized section has no handler"));
                }
                None => {
                    if descriptor.decompress {
                        match depack::decompress(payload) {
                            Ok(plain) => deferred.push(DeferredSection {
                                needs_asymmetric: false,
                                payload: plain,
                                crc_hash: descriptor.crc_hash,
                            }),
                            Err(error) => diagnostics.push(Diagnostic::new(
                                format!("{:#010x}", descriptor.crc_hash),
                                error.to_string(),
                            )),
                        }
                    } else {
                        deferred.push(DeferredSection {
                            needs_asymmetric: true,
                            payload: payload.to_vec(),
                            crc_hash: descriptor.crc_hash,
                        });
                    }
                }
            }
        }

        // Smallest first: the raw public-key structure is the smallest
        // deferred item and must resolve before anything that needs it.
        deferred.sort_by_key(|section| section.payload.len());

        let mut module_index = 1usize;
        for section in deferred {
            let context = format!("{:#010x}", section.crc_hash);
            if !section.needs_asymmetric {
                if read_u32_le(&section.payload, 0) == Some(pubkey::KEY_BITS_MARKER) {
                    match pubkey::parse_key_structure(&section.payload) {
                        Ok(handle) => {
                            log::info!("public key resolved from deferred section");
                            key = Some(handle);
                        }
                        Err(error) => {
                            diagnostics.push(Diagnostic::new(context, error.to_string()))
                        }
                    }
                } else if section.payload.starts_with(MODULE_MAGIC) {
                    self.store_module(
                        &mut report,
                        &mut module_index,
                        &section.payload,
                        depth,
                        diagnostics,
                    );
                } else {
                    report.insert(context, ConfigValue::Blob(section.payload));
                }
            } else if section.payload.len() > MODULE_SIZE_THRESHOLD {
                let Some(handle) = key.as_ref() else {
                    diagnostics.push(Diagnostic::new(
                        context,
                        ExtractError::missing_key("embedded module section").to_string(),
                    ));
                    continue;
                };
                match pubkey::decode_protected(handle, &section.payload) {
                    Ok(plain) => match find_subslice(&plain, MODULE_LZ_MARKER) {
                        Some(at) => match depack::decompress(&plain[at..]) {
                            Ok(module) => self.store_module(
                                &mut report,
                                &mut module_index,
                                &module,
                                depth,
                                diagnostics,
                            ),
                            Err(error) => {
                                diagnostics.push(Diagnostic::new(context, error.to_string()))
                            }
                        },
                        None => diagnostics.push(Diagnostic::new(
                            context,
                            "decrypted section has no embedded executable marker",
                        )),
                    },
                    Err(error) => diagnostics.push(Diagnostic::new(context, error.to_string())),
                }
            } else {
                // A small key-protected section is the client INI, even
                // when one was captured through a joiner hash already.
                client_ini = Some(section.payload);
            }
        }

        if let Some(handle) = &key {
            report.insert("PUB_KEY", ConfigValue::Text(handle.pem().to_string()));
            if let Some(blob) = client_ini {
                match pubkey::decode_protected(handle, &blob)
                    .and_then(|plain| ini::parse_ini_parameters(&plain))
                {
                    Ok(parameters) => {
                        for parameter in parameters {
                            report.insert(parameter.name, ConfigValue::Text(parameter.value));
                        }
                    }
                    Err(error) => diagnostics
                        .push(Diagnostic::new("CRC_CLIENT_INI", error.to_string())),
                }
            }
        } else if client_ini.is_some() {
            diagnostics.push(Diagnostic::new(
                "CRC_CLIENT_INI",
                ExtractError::missing_key("client INI section").to_string(),
            ));
        }

        Ok(report)
    }

    /// Recursively decodes an embedded module and records it under a fresh
    /// `DLL_n` key; a failed nested decode is recorded in place.
    fn store_module(
        &self,
        report: &mut ConfigReport,
        module_index: &mut usize,
        module: &[u8],
        depth: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let key = format!("DLL_{}", module_index);
        *module_index += 1;
        match self.decode_at_depth(module, depth + 1, diagnostics) {
            Ok(nested) => report.insert(key, ConfigValue::Module(nested)),
            Err(error) => {
                diagnostics.push(Diagnostic::new(key.clone(), error.to_string()));
                report.insert(key, ConfigValue::Failed(error.to_string()));
            }
        }
    }
}

/// Bounds-checked section slice against the flat image.
fn slice_section<'a>(image: &'a [u8], descriptor: &SectionDescriptor) -> Result<&'a [u8]> {
    let offset = descriptor.offset as usize;
    let length = descriptor.length as usize;
    image.get(offset..offset + length).ok_or_else(|| {
        ExtractError::truncated(
            descriptor.offset as u64,
            descriptor.length as u64,
            image.len() as u64,
        )
    })
}
