use wdi_hdr::models::{CountryEntry, DataPoint, Entry, Meta};

#[test]
fn parse_sample_json() {
    let sample = r#"
    [
      {"page":1,"pages":1,"per_page":"2","total":2},
      [
        {
          "indicator":{"id":"SP.POP.TOTL","value":"Population, total"},
          "country":{"id":"US","value":"United States"},
          "countryiso3code":"USA",
          "date":"2019",
          "value":328000000,
          "unit":"",
          "obs_status":null,
          "decimal":0
        },
        {
          "indicator":{"id":"SP.POP.TOTL","value":"Population, total"},
          "country":{"id":"US","value":"United States"},
          "countryiso3code":"USA",
          "date":"2020",
          "value":null,
          "unit":"",
          "obs_status":null,
          "decimal":0
        }
      ]
    ]
    "#;

    let v: serde_json::Value = serde_json::from_str(sample).unwrap();
    let arr = v.as_array().unwrap();
    let meta: Meta = serde_json::from_value(arr[0].clone()).unwrap();
    assert_eq!(meta.page, 1);
    assert_eq!(meta.per_page, 2);

    let entries: Vec<Entry> = serde_json::from_value(arr[1].clone()).unwrap();
    let points: Vec<DataPoint> = entries.into_iter().map(DataPoint::from).collect();
    assert_eq!(points[0].country_iso3, "USA");
    assert_eq!(points[0].year, 2019);
    assert_eq!(points[0].value, Some(328_000_000.0));
    assert_eq!(points[1].value, None);
}

#[test]
fn parse_country_list() {
    let sample = r#"
    [
      {"page":1,"pages":1,"per_page":"400","total":2},
      [
        {"id":"ABW","iso2Code":"AW","name":"Aruba",
         "region":{"id":"LCN","iso2code":"ZJ","value":"Latin America & Caribbean "},
         "adminregion":{"id":"","iso2code":"","value":""},
         "incomeLevel":{"id":"HIC","iso2code":"XD","value":"High income"},
         "lendingType":{"id":"LNX","iso2code":"XX","value":"Not classified"},
         "capitalCity":"Oranjestad","longitude":"-70.0167","latitude":"12.5167"},
        {"id":"AFE","iso2Code":"ZH","name":"Africa Eastern and Southern",
         "region":{"id":"NA","iso2code":"NA","value":"Aggregates"},
         "incomeLevel":{"id":"NA","iso2code":"NA","value":"Aggregates"}}
      ]
    ]
    "#;
    let v: serde_json::Value = serde_json::from_str(sample).unwrap();
    let entries: Vec<CountryEntry> = serde_json::from_value(v[1].clone()).unwrap();
    let rows: Vec<_> = entries
        .into_iter()
        .filter_map(CountryEntry::into_record)
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "Aruba");
    assert_eq!(rows[0].region.as_deref(), Some("Latin America & Caribbean"));
    assert_eq!(rows[1].income_group.as_deref(), Some("Aggregates"));
}
