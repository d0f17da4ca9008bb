//! Store-backed checks. They run against `TEST_DATABASE_URL` (or
//! `DATABASE_URL`) inside a rolled-back transaction and are skipped when no
//! database is reachable.

#[cfg(test)]
mod crm_store_tests {
    use diesel::prelude::*;
    use diesel::r2d2::{ConnectionManager, PooledConnection};
    use std::collections::HashSet;
    use uuid::Uuid;

    use leadserver::core::config::{DatabaseConfig, LeadSettings};
    use leadserver::core::error::CrmError;
    use leadserver::core::shared::enums::{FollowupStatus, Role};
    use leadserver::core::shared::schema::{follow_up_logs, leads, users};
    use leadserver::core::shared::utils::{create_conn, run_migrations};
    use leadserver::followups::service as followups;
    use leadserver::followups::types::{
        CreateFollowupRequest, ListFollowupsQuery, UpdateFollowupRequest,
    };
    use leadserver::followups::DueState;
    use leadserver::leads::import::{import_leads, ImportRow};
    use leadserver::leads::service as leads_service;
    use leadserver::leads::types::{
        CreateLeadOutcome, CreateLeadRequest, ListLeadsQuery, UpdateLeadRequest,
    };
    use leadserver::projects::resolve_or_create;
    use leadserver::security::CallerContext;

    type Conn = PooledConnection<ConnectionManager<PgConnection>>;

    fn connect() -> Option<Conn> {
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .ok()?;
        let config = DatabaseConfig {
            url,
            max_connections: 1,
            connection_timeout_secs: 2,
            ..Default::default()
        };
        let pool = match create_conn(&config) {
            Ok(pool) => pool,
            Err(e) => {
                println!("Skipping test - database not available: {e}");
                return None;
            }
        };
        if let Err(e) = run_migrations(&pool) {
            println!("Skipping test - migrations failed: {e}");
            return None;
        }
        let mut conn = pool.get().ok()?;
        conn.begin_test_transaction().ok()?;
        Some(conn)
    }

    macro_rules! conn_or_skip {
        () => {
            match connect() {
                Some(conn) => conn,
                None => {
                    println!("Skipping test - set TEST_DATABASE_URL to run");
                    return;
                }
            }
        };
    }

    fn seed_user(
        conn: &mut PgConnection,
        role: Role,
        manager: Option<Uuid>,
        sr_manager: Option<Uuid>,
        director: Option<Uuid>,
    ) -> CallerContext {
        let id = Uuid::new_v4();
        diesel::insert_into(users::table)
            .values((
                users::id.eq(id),
                users::name.eq(format!("{} {}", role, &id.to_string()[..8])),
                users::email.eq(format!("{id}@leadserver.test")),
                users::role.eq(role),
                users::manager_id.eq(manager),
                users::sr_manager_id.eq(sr_manager),
                users::director_id.eq(director),
            ))
            .execute(conn)
            .unwrap();
        CallerContext::new(id, role)
    }

    struct Org {
        director: CallerContext,
        manager: CallerContext,
        agent: CallerContext,
        other_agent: CallerContext,
    }

    fn seed_org(conn: &mut PgConnection) -> Org {
        let director = seed_user(conn, Role::Director, None, None, None);
        let sr = seed_user(conn, Role::SrManager, None, None, Some(director.user_id));
        let manager = seed_user(
            conn,
            Role::Manager,
            None,
            Some(sr.user_id),
            Some(director.user_id),
        );
        let agent = seed_user(
            conn,
            Role::Agent,
            Some(manager.user_id),
            Some(sr.user_id),
            Some(director.user_id),
        );
        let other_agent = seed_user(
            conn,
            Role::Agent,
            Some(manager.user_id),
            Some(sr.user_id),
            Some(director.user_id),
        );
        Org {
            director,
            manager,
            agent,
            other_agent,
        }
    }

    /// Ten-digit local number unlikely to collide with other test data.
    fn random_local_number() -> String {
        format!("3{:09}", Uuid::new_v4().as_u128() % 1_000_000_000)
    }

    fn lead_request(name: &str, phone: &str) -> CreateLeadRequest {
        CreateLeadRequest {
            name: Some(name.to_string()),
            phone: Some(phone.to_string()),
            country: Some("Pakistan".to_string()),
            ..Default::default()
        }
    }

    fn create(conn: &mut PgConnection, caller: &CallerContext, req: CreateLeadRequest) -> Uuid {
        match leads_service::create_lead(conn, caller, req).unwrap() {
            CreateLeadOutcome::Created(lead) => lead.id,
            CreateLeadOutcome::Exists { message, .. } => panic!("unexpected duplicate: {message}"),
        }
    }

    fn visible_ids(conn: &mut PgConnection, caller: &CallerContext) -> HashSet<Uuid> {
        let query = ListLeadsQuery {
            limit: Some(100),
            ..Default::default()
        };
        leads_service::list_leads(conn, caller, &query, &LeadSettings::default())
            .unwrap()
            .items
            .into_iter()
            .map(|item| item.lead.id)
            .collect()
    }

    #[test]
    fn test_agent_sees_only_own_leads() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);

        let own = create(&mut conn, &org.agent, lead_request("Own", &random_local_number()));
        let foreign = create(
            &mut conn,
            &org.other_agent,
            lead_request("Foreign", &random_local_number()),
        );
        let mut assigned = lead_request("Assigned", &random_local_number());
        assigned.assigned_to_id = Some(org.agent.user_id);
        let assigned = create(&mut conn, &org.manager, assigned);

        let query = ListLeadsQuery {
            limit: Some(100),
            ..Default::default()
        };
        let page =
            leads_service::list_leads(&mut conn, &org.agent, &query, &LeadSettings::default()).unwrap();
        for item in &page.items {
            assert!(
                item.lead.assigned_to_id == org.agent.user_id
                    || item.lead.created_by_id == org.agent.user_id
            );
        }
        let ids: HashSet<Uuid> = page.items.iter().map(|i| i.lead.id).collect();
        assert!(ids.contains(&own));
        assert!(ids.contains(&assigned));
        assert!(!ids.contains(&foreign));

        let err = leads_service::get_lead(&mut conn, &org.agent, foreign).unwrap_err();
        assert!(matches!(err, CrmError::NotFoundOrUnauthorized(_)));
    }

    #[test]
    fn test_director_sees_everything_a_manager_sees() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);

        create(&mut conn, &org.agent, lead_request("A", &random_local_number()));
        create(&mut conn, &org.other_agent, lead_request("B", &random_local_number()));
        create(&mut conn, &org.manager, lead_request("C", &random_local_number()));
        let director_only = create(&mut conn, &org.director, lead_request("D", &random_local_number()));

        let manager_view = visible_ids(&mut conn, &org.manager);
        let director_view = visible_ids(&mut conn, &org.director);
        assert_eq!(manager_view.len(), 3);
        assert!(manager_view.is_subset(&director_view));
        assert!(director_view.contains(&director_only));
        assert!(!manager_view.contains(&director_only));
    }

    #[test]
    fn test_phone_variants_deduplicate() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let local = random_local_number();

        let first = create(&mut conn, &org.agent, lead_request("First", &format!("+92{local}")));
        for variant in [format!("0{local}"), format!("92{local}"), local.clone()] {
            match leads_service::create_lead(&mut conn, &org.manager, lead_request("Again", &variant))
                .unwrap()
            {
                CreateLeadOutcome::Exists {
                    message,
                    existing_id,
                } => {
                    assert_eq!(existing_id, first);
                    assert!(message.starts_with("Lead already exists with Agent "));
                }
                CreateLeadOutcome::Created(_) => panic!("duplicate inserted for {variant}"),
            }
        }

        let rows: i64 = leads::table
            .filter(leads::phone_key.eq(local.as_str()))
            .count()
            .get_result(&mut *conn)
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_followup_status_machine() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let lead_id = create(&mut conn, &org.agent, lead_request("Lead", &random_local_number()));

        assert!(followups::list_for_lead(&mut conn, &org.agent, lead_id)
            .unwrap()
            .is_empty());

        let created = followups::create_followup(
            &mut conn,
            &org.agent,
            CreateFollowupRequest {
                lead_id: Some(lead_id),
                message: Some("Call about payment plan".into()),
                next_followup_date: Some("2030-01-15T10:00".into()),
            },
        )
        .unwrap();
        assert_eq!(created.current_status, FollowupStatus::Pending);
        assert_eq!(created.logs.len(), 1);
        let id = created.followup.id;

        let toggled = followups::toggle_status(&mut conn, &org.agent, id).unwrap();
        assert_eq!(toggled.status, FollowupStatus::Done);
        let toggled = followups::toggle_status(&mut conn, &org.agent, id).unwrap();
        assert_eq!(toggled.status, FollowupStatus::Pending);

        let updated = followups::update_followup(
            &mut conn,
            &org.agent,
            id,
            UpdateFollowupRequest {
                message: Some("Call about payment plan".into()),
                next_followup_date: None,
            },
        )
        .unwrap();
        assert_eq!(updated.current_status, FollowupStatus::Rescheduled);

        let toggled = followups::toggle_status(&mut conn, &org.agent, id).unwrap();
        assert_eq!(toggled.status, FollowupStatus::Done);

        let history = followups::followup_logs(&mut conn, &org.manager, id).unwrap();
        let statuses: Vec<_> = history.iter().map(|l| l.status).collect();
        assert_eq!(
            statuses,
            [
                FollowupStatus::Pending,
                FollowupStatus::Done,
                FollowupStatus::Pending,
                FollowupStatus::Rescheduled,
                FollowupStatus::Done,
            ]
        );

        let err = followups::toggle_status(&mut conn, &org.other_agent, id).unwrap_err();
        assert!(matches!(err, CrmError::NotFoundOrUnauthorized(_)));
    }

    #[test]
    fn test_lead_delete_cascades() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let lead_id = create(&mut conn, &org.agent, lead_request("Gone", &random_local_number()));
        let followup = followups::create_followup(
            &mut conn,
            &org.agent,
            CreateFollowupRequest {
                lead_id: Some(lead_id),
                message: Some("Site visit".into()),
                next_followup_date: Some("2030-02-01".into()),
            },
        )
        .unwrap();

        let err = leads_service::delete_lead(&mut conn, &org.manager, lead_id).unwrap_err();
        assert!(matches!(err, CrmError::Forbidden(_)));

        leads_service::delete_lead(&mut conn, &org.director, lead_id).unwrap();

        assert!(followups::list_for_lead(&mut conn, &org.director, lead_id)
            .unwrap()
            .is_empty());
        let orphans: i64 = follow_up_logs::table
            .filter(follow_up_logs::followup_id.eq(followup.followup.id))
            .count()
            .get_result(&mut *conn)
            .unwrap();
        assert_eq!(orphans, 0);
    }

    fn import_row(name: Option<&str>, project: &str) -> ImportRow {
        ImportRow {
            name: name.map(String::from),
            phone: Some(format!("0{}", random_local_number())),
            country: Some("Pakistan".into()),
            city: Some("Lahore".into()),
            area_interested_in: Some("DHA".into()),
            plan_interested_in: Some("Installments".into()),
            property_type: Some("Apartment".into()),
            project: Some(project.to_string()),
            budget: Some("not a number".into()),
            plan_to_purchase: Some("6 months".into()),
            lead_source: Some("Walk-in".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_import_reports_row_errors_and_keeps_valid_rows() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let project = format!("Project {}", Uuid::new_v4());

        let rows = vec![
            import_row(Some("One"), &project),
            import_row(Some("Two"), &project),
            import_row(None, &project),
            import_row(Some("Four"), &project),
        ];
        let report = import_leads(&mut conn, &org.manager, rows).unwrap();

        assert_eq!(report.imported, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 4);
        assert!(report.errors[0].error.contains("name"));

        let page = leads_service::list_leads(
            &mut conn,
            &org.manager,
            &ListLeadsQuery::default(),
            &LeadSettings::default(),
        )
        .unwrap();
        assert_eq!(page.total_count, 3);
        assert!(page.items.iter().all(|i| i.project_name == project && i.lead.budget == 0));
    }

    #[test]
    fn test_pagination_is_disjoint_and_complete() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let mut created = HashSet::new();
        for n in 0..25 {
            created.insert(create(
                &mut conn,
                &org.agent,
                lead_request(&format!("Lead {n}"), &random_local_number()),
            ));
        }

        let mut seen = HashSet::new();
        for page_no in 1..=3 {
            let query = ListLeadsQuery {
                page: Some(page_no),
                limit: Some(10),
                ..Default::default()
            };
            let page =
                leads_service::list_leads(&mut conn, &org.agent, &query, &LeadSettings::default())
                    .unwrap();
            assert_eq!(page.total_count, 25);
            assert_eq!(page.total_pages, 3);
            for item in page.items {
                assert!(seen.insert(item.lead.id), "lead repeated across pages");
            }
        }
        assert_eq!(seen, created);

        let bad = ListLeadsQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            leads_service::list_leads(&mut conn, &org.agent, &bad, &LeadSettings::default()),
            Err(CrmError::Validation(_))
        ));
    }

    #[test]
    fn test_import_of_several_thousand_rows_completes() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let project = format!("Tower {}", Uuid::new_v4());
        let base = Uuid::new_v4().as_u128() % 100_000;

        let rows: Vec<ImportRow> = (0..3600)
            .map(|i| {
                let mut row = import_row(Some(&format!("Bulk {i}")), &project);
                row.phone = Some(format!("05{base:05}{i:04}"));
                row
            })
            .collect();
        let report = import_leads(&mut conn, &org.manager, rows).unwrap();

        assert!(report.errors.is_empty(), "{:?}", &report.errors[..report.errors.len().min(3)]);
        assert_eq!(report.imported, 3600);
        let stored: i64 = leads::table
            .filter(leads::created_by_id.eq(org.manager.user_id))
            .count()
            .get_result(&mut *conn)
            .unwrap();
        assert_eq!(stored, 3600);
    }

    fn schedule(conn: &mut PgConnection, caller: &CallerContext, lead_id: Uuid, date: &str) -> Uuid {
        followups::create_followup(
            conn,
            caller,
            CreateFollowupRequest {
                lead_id: Some(lead_id),
                message: Some("Follow up".into()),
                next_followup_date: Some(date.into()),
            },
        )
        .unwrap()
        .followup
        .id
    }

    fn listed(conn: &mut PgConnection, caller: &CallerContext, query: &ListFollowupsQuery) -> HashSet<Uuid> {
        followups::list_all(conn, caller, query)
            .unwrap()
            .into_iter()
            .map(|item| item.followup.id)
            .collect()
    }

    #[test]
    fn test_followup_listing_is_scoped_by_creator() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let outsider = seed_user(&mut conn, Role::Manager, None, None, None);

        let lead_id = create(&mut conn, &org.agent, lead_request("Scoped", &random_local_number()));
        let by_agent = schedule(&mut conn, &org.agent, lead_id, "2031-01-01");

        // Written by the director on a lead the manager's agent owns.
        let mut directed = lead_request("Directed", &random_local_number());
        directed.assigned_to_id = Some(org.agent.user_id);
        let directed = create(&mut conn, &org.director, directed);
        let by_director = schedule(&mut conn, &org.director, directed, "2031-01-02");

        let all = ListFollowupsQuery::default();
        let manager_view = listed(&mut conn, &org.manager, &all);
        assert!(manager_view.contains(&by_agent));
        assert!(!manager_view.contains(&by_director));

        let director_view = listed(&mut conn, &org.director, &all);
        assert!(director_view.contains(&by_agent));
        assert!(director_view.contains(&by_director));

        assert!(listed(&mut conn, &outsider, &all).is_empty());
        assert!(!listed(&mut conn, &org.other_agent, &all).contains(&by_agent));

        let only_agent = ListFollowupsQuery {
            agent_id: Some(org.agent.user_id),
            ..Default::default()
        };
        assert_eq!(
            listed(&mut conn, &org.director, &only_agent),
            HashSet::from([by_agent])
        );
    }

    #[test]
    fn test_followup_status_filter_uses_derived_status() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let lead_id = create(&mut conn, &org.agent, lead_request("Filter", &random_local_number()));

        let pending = schedule(&mut conn, &org.agent, lead_id, "2031-03-01");
        let done = schedule(&mut conn, &org.agent, lead_id, "2031-03-02");
        let rescheduled = schedule(&mut conn, &org.agent, lead_id, "2031-03-03");
        followups::toggle_status(&mut conn, &org.agent, done).unwrap();
        followups::update_followup(
            &mut conn,
            &org.agent,
            rescheduled,
            UpdateFollowupRequest {
                message: None,
                next_followup_date: Some("2031-04-01".into()),
            },
        )
        .unwrap();

        for (status, expected) in [
            (FollowupStatus::Pending, pending),
            (FollowupStatus::Done, done),
            (FollowupStatus::Rescheduled, rescheduled),
        ] {
            let query = ListFollowupsQuery {
                status: Some(status),
                ..Default::default()
            };
            assert_eq!(
                listed(&mut conn, &org.agent, &query),
                HashSet::from([expected]),
                "{status}"
            );
        }
        let skipped = ListFollowupsQuery {
            status: Some(FollowupStatus::Skipped),
            ..Default::default()
        };
        assert!(listed(&mut conn, &org.agent, &skipped).is_empty());
    }

    #[test]
    fn test_followups_classified_due_at_read_time() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let lead_id = create(&mut conn, &org.agent, lead_request("Due", &random_local_number()));
        let past = schedule(&mut conn, &org.agent, lead_id, "2020-06-01");
        let future = schedule(&mut conn, &org.agent, lead_id, "2099-06-01");

        let items = followups::list_all(&mut conn, &org.agent, &ListFollowupsQuery::default()).unwrap();
        let due_of = |id: Uuid| items.iter().find(|i| i.followup.id == id).map(|i| i.due);
        assert_eq!(due_of(past), Some(DueState::Overdue));
        assert_eq!(due_of(future), Some(DueState::Upcoming));
        assert_eq!(items.first().map(|i| i.followup.id), Some(past));

        let (overdue, upcoming) = followups::pending_due_counts(
            &mut conn,
            &leadserver::security::Scope::only(org.agent.user_id),
        )
        .unwrap();
        assert_eq!((overdue, upcoming), (1, 1));
    }

    #[test]
    fn test_lead_followups_expand_their_author() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let lead_id = create(&mut conn, &org.agent, lead_request("Authored", &random_local_number()));
        schedule(&mut conn, &org.agent, lead_id, "2031-05-01");
        schedule(&mut conn, &org.manager, lead_id, "2031-05-02");

        let history = followups::list_for_lead(&mut conn, &org.other_agent, lead_id).unwrap();
        assert_eq!(history.len(), 2);
        // Newest first.
        let newest = history[0].created_by.as_ref().unwrap();
        assert_eq!(newest.id, org.manager.user_id);
        assert_eq!(newest.role, Role::Manager);
        let oldest = history[1].created_by.as_ref().unwrap();
        assert_eq!(oldest.id, org.agent.user_id);
        assert!(oldest.name.starts_with("AGENT"));
    }

    #[test]
    fn test_reassign_rejects_assignee_outside_scope() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let stranger = seed_user(&mut conn, Role::Agent, None, None, None);
        let lead_id = create(&mut conn, &org.agent, lead_request("Move", &random_local_number()));

        match leads_service::reassign_lead(&mut conn, &org.director, lead_id, stranger.user_id) {
            Err(CrmError::Validation(fields)) => assert_eq!(fields[0].field, "newAssigneeId"),
            other => panic!("unexpected {other:?}"),
        }
        match leads_service::reassign_lead(&mut conn, &org.director, lead_id, Uuid::new_v4()) {
            Err(CrmError::Validation(fields)) => assert_eq!(fields[0].field, "newAssigneeId"),
            other => panic!("unexpected {other:?}"),
        }

        let moved =
            leads_service::reassign_lead(&mut conn, &org.director, lead_id, org.other_agent.user_id)
                .unwrap();
        assert_eq!(moved.lead.assigned_to_id, org.other_agent.user_id);
        assert!(visible_ids(&mut conn, &org.other_agent).contains(&lead_id));
    }

    #[test]
    fn test_update_to_taken_phone_conflicts() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let taken = random_local_number();
        create(&mut conn, &org.agent, lead_request("Holder", &taken));
        let lead_id = create(&mut conn, &org.agent, lead_request("Mover", &random_local_number()));

        let req = UpdateLeadRequest {
            phone: Some(format!("+92 {taken}")),
            ..Default::default()
        };
        let err = leads_service::update_lead(&mut conn, &org.manager, lead_id, req).unwrap_err();
        assert!(matches!(err, CrmError::Conflict(_)));

        let own_phone = random_local_number();
        let req = UpdateLeadRequest {
            phone: Some(format!("0{own_phone}")),
            ..Default::default()
        };
        let updated = leads_service::update_lead(&mut conn, &org.manager, lead_id, req).unwrap();
        assert_eq!(updated.lead.phone_key, own_phone);
    }

    #[test]
    fn test_update_clears_optional_fields() {
        let mut conn = conn_or_skip!();
        let org = seed_org(&mut conn);
        let project_id = resolve_or_create(&mut conn, &format!("Gardens {}", Uuid::new_v4())).unwrap();
        let mut req = lead_request("Clearable", &random_local_number());
        req.email = Some("buyer@example.com".into());
        req.city = Some("Karachi".into());
        req.project_id = Some(project_id);
        let lead_id = create(&mut conn, &org.agent, req);

        let patch: UpdateLeadRequest = serde_json::from_value(serde_json::json!({
            "email": "",
            "city": null,
            "projectId": null,
        }))
        .unwrap();
        let updated = leads_service::update_lead(&mut conn, &org.manager, lead_id, patch).unwrap();
        assert_eq!(updated.lead.email, None);
        assert_eq!(updated.lead.city, None);
        assert_eq!(updated.lead.project_id, None);
        assert!(updated.project.is_none());
        assert_eq!(updated.lead.name, "Clearable");
    }
}
