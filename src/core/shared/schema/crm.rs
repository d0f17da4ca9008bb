use super::core::{projects, users};

diesel::table! {
    leads (id) {
        id -> Uuid,
        name -> Text,
        phone -> Text,
        phone_key -> Text,
        email -> Nullable<Text>,
        country -> Text,
        city -> Nullable<Text>,
        area_interested_in -> Nullable<Text>,
        plan_interested_in -> Nullable<Text>,
        property_type -> Nullable<Text>,
        project_id -> Nullable<Uuid>,
        budget -> Int8,
        plan_to_purchase -> Nullable<Text>,
        lead_source -> Nullable<Text>,
        notes -> Nullable<Text>,
        status -> Text,
        assigned_to_id -> Uuid,
        created_by_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    follow_ups (id) {
        id -> Uuid,
        lead_id -> Uuid,
        message -> Text,
        next_followup_date -> Timestamptz,
        created_by_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    follow_up_logs (id) {
        id -> Uuid,
        followup_id -> Uuid,
        status -> Text,
        updated_by_id -> Uuid,
        logged_at -> Timestamptz,
        seq -> Int8,
    }
}

diesel::joinable!(follow_ups -> leads (lead_id));
diesel::joinable!(follow_up_logs -> follow_ups (followup_id));
diesel::joinable!(leads -> projects (project_id));

diesel::allow_tables_to_appear_in_same_query!(
    leads,
    follow_ups,
    follow_up_logs,
    projects,
    users,
);
