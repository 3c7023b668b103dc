use super::*;

const GARMIN_TCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2"
    xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <Activities><Activity Sport="Biking"><Lap><Track>
    <Trackpoint>
      <Time>2024-05-01T10:00:00.000Z</Time>
      <DistanceMeters>0.0</DistanceMeters>
      <HeartRateBpm><Value>120</Value></HeartRateBpm>
      <Cadence>85</Cadence>
      <Extensions><ns3:TPX><ns3:Watts>210</ns3:Watts></ns3:TPX></Extensions>
    </Trackpoint>
    <Trackpoint>
      <Time>2024-05-01T10:00:01Z</Time>
      <HeartRateBpm><Value>121</Value></HeartRateBpm>
    </Trackpoint>
    <Trackpoint>
      <Time>not a time</Time>
      <HeartRateBpm><Value>122</Value></HeartRateBpm>
    </Trackpoint>
    <Trackpoint>
      <Time>2024-05-01T10:00:02Z</Time>
      <Extensions><TPX><Watts>abc</Watts></TPX></Extensions>
    </Trackpoint>
  </Track></Lap></Activity></Activities>
</TrainingCenterDatabase>"#;

#[test]
fn extracts_channels_by_local_name() {
    let mut report = ParseReport::default();
    let points = parse_tcx(GARMIN_TCX, &mut report).unwrap();

    assert_eq!(report.records_seen, 4);
    assert_eq!(report.skipped_bad_time, 1);
    assert_eq!(report.dropped_power, 1);
    assert_eq!(points.len(), 3);

    assert_eq!(points[0].power, Some(210.0));
    assert_eq!(points[0].hr, Some(120.0));
    assert_eq!(points[0].cadence, Some(85.0));
    assert_eq!(points[0].distance, Some(0.0));

    assert_eq!(points[1].power, None);
    assert_eq!(points[1].hr, Some(121.0));
    assert_eq!(points[2].power, None);
}

#[test]
fn document_without_trackpoints_is_malformed() {
    let mut report = ParseReport::default();
    let err = parse_tcx("<TrainingCenterDatabase/>", &mut report).unwrap_err();
    assert!(matches!(err, PulseError::MalformedInput(_)));
}

#[test]
fn broken_xml_is_malformed() {
    let mut report = ParseReport::default();
    let err = parse_tcx("<Trackpoint><Time>", &mut report).unwrap_err();
    assert!(matches!(err, PulseError::MalformedInput(_)));
}
