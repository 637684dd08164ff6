use crate::api::roster;
use crate::config::Config;
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    cfg.service(
        web::scope(&config.api_prefix).service(
            web::scope("/roster")
                // /roster
                .service(web::resource("").route(web::get().to(roster::get_roster)))
                .service(
                    web::resource("/departments").route(web::get().to(roster::list_departments)),
                )
                .service(web::resource("/filter").route(web::put().to(roster::set_filter)))
                // /roster/add-form
                .service(web::resource("/add-form").route(web::put().to(roster::update_add_draft)))
                .service(
                    web::resource("/add-form/open").route(web::post().to(roster::open_add_form)),
                )
                .service(
                    web::resource("/add-form/close").route(web::post().to(roster::close_add_form)),
                )
                .service(web::resource("/add").route(web::post().to(roster::submit_add)))
                // /roster/edit
                .service(web::resource("/edit").route(web::put().to(roster::update_edit_draft)))
                .service(web::resource("/edit/save").route(web::post().to(roster::save_edit)))
                .service(web::resource("/edit/cancel").route(web::post().to(roster::cancel_edit)))
                // /roster/delete
                .service(
                    web::resource("/delete/confirm").route(web::post().to(roster::confirm_delete)),
                )
                .service(
                    web::resource("/delete/cancel").route(web::post().to(roster::cancel_delete)),
                )
                // /roster/employees/{id}/...
                .service(
                    web::resource("/employees/{id}/edit").route(web::post().to(roster::start_edit)),
                )
                .service(
                    web::resource("/employees/{id}/delete")
                        .route(web::post().to(roster::request_delete)),
                )
                .service(
                    web::resource("/employees/{id}/toggle-status")
                        .route(web::post().to(roster::toggle_status)),
                )
                .service(web::resource("/notice").route(web::delete().to(roster::dismiss_notice))),
        ),
    );
}
