//! The GenApi XML descriptor region (`spec.md` §3 `XmlBlob`, §6).

/// Device-memory address the XML region is mapped at.
pub const BASE_ADDRESS: u32 = 0x10000;

/// Advertised length of the XML region, matching the URL string written
/// into the bootstrap block (`Local:camera.xml;0x10000;0x3A00`).
pub const SIZE: usize = 0x3A00;

const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RegisterDescription
  ModelName="GVCP-SIM"
  VendorName="Acme Vision"
  StandardNameSpace="None"
  SchemaMajorVersion="1" SchemaMinorVersion="1" SchemaSubMinorVersion="0"
  MajorVersion="1" MinorVersion="0" SubMinorVersion="0"
  xmlns="http://www.genicam.org/GenApi/Version_1_1">
  <Category Name="Root" NameSpace="Standard">
    <pFeature>DeviceControl</pFeature>
    <pFeature>AcquisitionControl</pFeature>
    <pFeature>TransportLayerControl</pFeature>
  </Category>
  <IntReg Name="AcquisitionStart" NameSpace="Standard">
    <Address>0x1000</Address>
    <Length>4</Length>
    <AccessMode>WO</AccessMode>
    <pPort>Device</pPort>
  </IntReg>
  <IntReg Name="AcquisitionStop" NameSpace="Standard">
    <Address>0x1004</Address>
    <Length>4</Length>
    <AccessMode>WO</AccessMode>
    <pPort>Device</pPort>
  </IntReg>
  <IntReg Name="PixelFormat" NameSpace="Standard">
    <Address>0x1008</Address>
    <Length>4</Length>
    <AccessMode>RW</AccessMode>
    <pPort>Device</pPort>
  </IntReg>
  <IntReg Name="ExposureTimeUs" NameSpace="Standard">
    <Address>0x100C</Address>
    <Length>4</Length>
    <AccessMode>RW</AccessMode>
    <pPort>Device</pPort>
  </IntReg>
  <IntReg Name="GevSCDA" NameSpace="Standard">
    <Address>0x1010</Address>
    <Length>4</Length>
    <AccessMode>RW</AccessMode>
    <pPort>Device</pPort>
  </IntReg>
  <Port Name="Device"/>
</RegisterDescription>
"#;

/// Immutable, read-only byte slice describing the GenApi node map.
///
/// Padded with an XML comment to exactly [`SIZE`] bytes so the address
/// range advertised in the bootstrap XML URL register is fully backed.
#[derive(Debug, Clone)]
pub struct XmlBlob {
    bytes: Vec<u8>,
}

impl XmlBlob {
    /// Build the blob from raw bytes, padding/truncating to [`SIZE`].
    pub fn new(mut bytes: Vec<u8>) -> Self {
        bytes.resize(SIZE, 0);
        Self { bytes }
    }

    /// The descriptor shipped with this device implementation.
    pub fn standard_descriptor() -> Self {
        let mut bytes = TEMPLATE.as_bytes().to_vec();
        pad_with_comment(&mut bytes, SIZE);
        Self::new(bytes)
    }

    /// Borrow the full blob.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read `len` bytes starting at `offset` within the blob.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.bytes.get(offset..end)
    }
}

fn pad_with_comment(bytes: &mut Vec<u8>, target: usize) {
    if bytes.len() >= target {
        bytes.truncate(target);
        return;
    }
    let remaining = target - bytes.len();
    // An XML comment is the one padding shape that keeps the document
    // well-formed if read from offset 0 to `target`.
    if remaining >= 7 {
        bytes.extend_from_slice(b"<!--");
        let fill_len = remaining - 7;
        bytes.extend(std::iter::repeat(b' ').take(fill_len));
        bytes.extend_from_slice(b"-->");
    } else {
        bytes.extend(std::iter::repeat(0u8).take(remaining));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_descriptor_has_advertised_size() {
        let blob = XmlBlob::standard_descriptor();
        assert_eq!(blob.as_bytes().len(), SIZE);
    }

    #[test]
    fn read_first_bytes_matches_template_head() {
        let blob = XmlBlob::standard_descriptor();
        let head = blob.read_bytes(0, 5).unwrap();
        assert_eq!(head, b"<?xml");
    }

    #[test]
    fn out_of_range_read_is_none() {
        let blob = XmlBlob::standard_descriptor();
        assert!(blob.read_bytes(SIZE - 3, 8).is_none());
    }

    #[test]
    fn custom_blob_is_padded_to_size() {
        let blob = XmlBlob::new(b"<x/>".to_vec());
        assert_eq!(blob.as_bytes().len(), SIZE);
        assert_eq!(&blob.as_bytes()[..4], b"<x/>");
    }
}
