//! Proptest strategies for regions and canonical identifiers.

use proptest::prelude::*;

/// Regions of the standard partition
pub fn standard_region_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("us-east-1".to_string()),
        Just("us-west-2".to_string()),
        Just("eu-central-1".to_string()),
        Just("ap-southeast-2".to_string()),
        Just("sa-east-1".to_string()),
    ]
}

/// Regions of the China partition
pub fn china_region_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("cn-north-1".to_string()),
        Just("cn-northwest-1".to_string()),
    ]
}

/// Regions of the GovCloud partition
pub fn gov_region_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("us-gov-west-1".to_string()),
        Just("us-gov-east-1".to_string()),
    ]
}

pub fn any_region_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        standard_region_strategy(),
        china_region_strategy(),
        gov_region_strategy(),
    ]
}

/// Canonical (standard partition) identifiers with arbitrary remainders
pub fn canonical_identifier_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("iam"), Just("s3"), Just("kms"), Just("ssm"), Just("ecs")],
        prop_oneof![Just(String::new()), Just("us-east-1".to_string())],
        prop_oneof![Just(String::new()), Just("123456789012".to_string())],
        "[a-z][a-z0-9/_.:-]{0,40}",
    )
        .prop_map(|(service, region, account, resource)| {
            format!("arn:aws:{service}:{region}:{account}:{resource}")
        })
}
