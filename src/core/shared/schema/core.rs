diesel::table! {
    teams (id) {
        id -> Uuid,
        name -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        name -> Text,
        email -> Text,
        role -> Text,
        manager_id -> Nullable<Uuid>,
        sr_manager_id -> Nullable<Uuid>,
        director_id -> Nullable<Uuid>,
        cco_id -> Nullable<Uuid>,
        team_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    projects (id) {
        id -> Uuid,
        name -> Text,
        project_type -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(users -> teams (team_id));
